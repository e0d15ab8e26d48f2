//! # Analyzer
//!
//! Front end producing the [`Script`](crate::ast::Script) AST:
//!
//! * [`parser`]: recursive descent over the significant tokens
//! * [`validate`]: semantic checks (default state, event catalog, state targets)
//!
//! [`parse_script`] runs tokenizer, parser and validation in sequence;
//! [`load_ast_json`] accepts the same AST from an external producer.

pub mod core;
pub mod parser;
pub mod validate;

pub use core::ParseError;
pub use core::ParseResult;
pub use parser::ScriptParser;
pub use validate::validate;

use crate::ast::Script;
use crate::tokenizer::{TokenSpan, Tokenizer};

/// Tokenize and parse without semantic validation.
pub fn parse_source(source: &str) -> Result<Script, ParseError> {
    let tokens: Vec<TokenSpan> = Tokenizer::new()
        .tokenize(source)?
        .into_iter()
        .filter(|span| !span.token.is_trivia())
        .collect();
    ScriptParser::new(&tokens).parse()
}

#[tracing::instrument(level = "debug", skip(source))]
pub fn parse_script(source: &str) -> Result<Script, ParseError> {
    let script = parse_source(source)?;
    validate(&script)?;
    Ok(script)
}

pub fn load_ast_json(json: &str) -> Result<Script, ParseError> {
    let script: Script =
        serde_json::from_str(json).map_err(|e| ParseError::InvalidAst(e.to_string()))?;
    validate(&script)?;
    Ok(script)
}
