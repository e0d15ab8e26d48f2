//! # LSL Tokenizer
//!
//! Converts LSL source text into a stream of [`TokenSpan`](token::TokenSpan)s
//! using `nom` combinators. Whitespace and comments are kept as trivia tokens
//! so positions stay exact; the [`analyzer`](crate::analyzer) filters them out.

pub mod comment;
pub mod keyword;
pub mod literal;
pub mod symbol;
pub mod token;
pub mod whitespace;

pub use token::{Span, Token, TokenSpan, Tokenizer, TokenizerError};
