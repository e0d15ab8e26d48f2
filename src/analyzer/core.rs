use thiserror::Error;

use crate::tokenizer::Span;

/// Position after the parse plus the parsed value.
pub type ParseResult<O> = Result<(usize, O), ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span}: {message} (found `{found}`)")]
    ParseError {
        message: String,
        found: String,
        span: Span,
    },
    #[error("Unexpected EOF: {0}")]
    UnexpectedEOF(String),
    #[error("Tokenize error: {0}")]
    Tokenize(#[from] crate::tokenizer::TokenizerError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid AST: {0}")]
    InvalidAst(String),
}

impl ParseError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        ParseError::Validation(message.into())
    }
}
