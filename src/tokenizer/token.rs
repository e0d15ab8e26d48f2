use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    combinator::recognize,
    error::{context, VerboseError},
    sequence::pair,
    IResult,
};
use thiserror::Error;

use crate::ast::LslType;

use super::{
    comment::parse_comment,
    keyword::Keyword,
    literal::{parse_literal, Literal},
    symbol::{parse_delimiter, parse_operator, Delimiter, Operator},
    whitespace::{parse_newline, parse_whitespace},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Keyword(Keyword),
    // Identifiers
    Identifier(String),
    // Types
    Type(LslType),
    // Symbols
    Operator(Operator),
    Delimiter(Delimiter),
    // Literals
    Literal(Literal),
    // Formatting
    Whitespace(String),
    Newline,
    Comment {
        content: String,
        comment_type: CommentType,
    },
}

impl Token {
    /// Whitespace, newlines and comments carry no meaning for the parser.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            Token::Whitespace(_) | Token::Newline | Token::Comment { .. }
        )
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Keyword(k) => write!(f, "{}", k),
            Token::Identifier(id) => write!(f, "{}", id),
            Token::Type(t) => write!(f, "{}", t),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Delimiter(d) => write!(f, "{}", d),
            Token::Literal(Literal::Integer(i)) => write!(f, "{}", i),
            Token::Literal(Literal::Float(x)) => write!(f, "{}", x),
            Token::Literal(Literal::String(s)) => write!(f, "{:?}", s),
            Token::Whitespace(_) => write!(f, "whitespace"),
            Token::Newline => write!(f, "newline"),
            Token::Comment { .. } => write!(f, "comment"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentType {
    Line,  // //
    Block, // /* */
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    current_position: usize,
    current_line: usize,
    current_column: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            current_position: 0,
            current_line: 1,   // 1-based
            current_column: 1, // 1-based
        }
    }

    #[tracing::instrument(level = "debug", skip(self, input))]
    pub fn tokenize(&mut self, input: &str) -> TokenizerResult<Vec<TokenSpan>> {
        let mut tokens = Vec::new();
        let mut remaining = input;

        while !remaining.is_empty() {
            let start_position = self.current_position;
            let start_line = self.current_line;
            let start_column = self.current_column;

            let result = alt((
                // Formatting
                parse_whitespace,
                parse_newline,
                // Comments before operators so `//` is not read as two divides
                parse_comment,
                // Literals
                parse_literal,
                // Code elements
                parse_identifier,
                parse_operator,
                parse_delimiter,
            ))(remaining);

            match result {
                Ok((new_remaining, token)) => {
                    let consumed = &remaining[..(remaining.len() - new_remaining.len())];
                    self.update_position(consumed);

                    tokens.push(TokenSpan {
                        token,
                        start: start_position,
                        end: self.current_position,
                        line: start_line,
                        column: start_column,
                    });

                    remaining = new_remaining;
                }
                Err(e) => {
                    let found = remaining.chars().take(20).collect::<String>();
                    let span = Span {
                        start: self.current_position,
                        end: self.current_position + 1,
                        line: self.current_line,
                        column: self.current_column,
                    };
                    let error = match e {
                        nom::Err::Incomplete(e) => TokenizerError::ParseError {
                            message: format!("Incomplete input, {:?}", e),
                            found,
                            span,
                        },
                        nom::Err::Error(e) | nom::Err::Failure(e) => TokenizerError::ParseError {
                            message: nom::error::convert_error(remaining, e).to_string(),
                            found,
                            span,
                        },
                    };
                    tracing::error!("{}", error);
                    return Err(error);
                }
            }
        }

        Ok(tokens)
    }

    fn update_position(&mut self, text: &str) {
        for c in text.chars() {
            self.current_position += c.len_utf8();
            if c == '\n' {
                self.current_line += 1;
                self.current_column = 1;
            } else {
                self.current_column += 1;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    pub token: Token,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl TokenSpan {
    pub fn span(&self) -> Span {
        Span {
            start: self.start,
            end: self.end,
            line: self.line,
            column: self.column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_identifier(input: &str) -> ParserResult<Token> {
    let (input, id) = identifier_text(input)?;

    // Check if identifier is not a specials
    if let Ok(kw) = Keyword::from_str(id) {
        return Ok((input, Token::Keyword(kw)));
    }
    if let Ok(ty) = LslType::from_str(id) {
        return Ok((input, Token::Type(ty)));
    }

    Ok((input, Token::Identifier(id.to_string())))
}

fn identifier_text(input: &str) -> ParserResult<&str> {
    context(
        "identifier",
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
    )(input)
}

pub type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub type TokenizerResult<T> = Result<T, TokenizerError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenizerError {
    #[error("Tokenize error at {span}: {message}")]
    ParseError {
        message: String,
        found: String,
        span: Span,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn significant(input: &str) -> Vec<Token> {
        Tokenizer::new()
            .tokenize(input)
            .unwrap()
            .into_iter()
            .filter(|t| !t.token.is_trivia())
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_identifier_for_keyword() {
        let (rest, token) = parse_identifier("default {").unwrap();
        assert_eq!(token, Token::Keyword(Keyword::Default));
        assert_eq!(rest, " {");
    }

    #[test]
    fn test_identifier_prefix_of_keyword() {
        let (_, token) = parse_identifier("stateful").unwrap();
        assert_eq!(token, Token::Identifier("stateful".to_string()));
        let (_, token) = parse_identifier("quaternion").unwrap();
        assert_eq!(token, Token::Type(LslType::Rotation));
    }

    #[test]
    fn test_tokenizer_with_position() {
        let tokens = Tokenizer::new().tokenize("x\n  y").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 1);
        let y = tokens
            .iter()
            .find(|t| t.token == Token::Identifier("y".into()))
            .unwrap();
        assert_eq!(y.line, 2);
        assert_eq!(y.column, 3);
    }

    #[test]
    fn test_hello_world() {
        let tokens = significant(r#"default { state_entry() { llSay(0, "hi"); } }"#);
        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Default),
                Token::Delimiter(Delimiter::OpenBrace),
                Token::Identifier("state_entry".into()),
                Token::Delimiter(Delimiter::OpenParen),
                Token::Delimiter(Delimiter::CloseParen),
                Token::Delimiter(Delimiter::OpenBrace),
                Token::Identifier("llSay".into()),
                Token::Delimiter(Delimiter::OpenParen),
                Token::Literal(Literal::Integer(0)),
                Token::Delimiter(Delimiter::Comma),
                Token::Literal(Literal::String("hi".into())),
                Token::Delimiter(Delimiter::CloseParen),
                Token::Delimiter(Delimiter::Semicolon),
                Token::Delimiter(Delimiter::CloseBrace),
                Token::Delimiter(Delimiter::CloseBrace),
            ]
        );
    }

    #[test]
    fn test_comments_are_trivia() {
        let tokens = significant("a // line\n /* block */ b / c");
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("a".into()),
                Token::Identifier("b".into()),
                Token::Operator(Operator::Divide),
                Token::Identifier("c".into()),
            ]
        );
    }

    #[test]
    fn test_vector_tokens() {
        let tokens = significant("<1.0, 2, .5>");
        assert_eq!(tokens.len(), 7);
        assert_eq!(tokens[0], Token::Operator(Operator::Less));
        assert_eq!(tokens[5], Token::Literal(Literal::Float(0.5)));
        assert_eq!(tokens[6], Token::Operator(Operator::Greater));
    }

    #[test]
    fn test_error_position() {
        let err = Tokenizer::new().tokenize("x = 1;\n  $").unwrap_err();
        match err {
            TokenizerError::ParseError { span, found, .. } => {
                assert_eq!(span.line, 2);
                assert_eq!(span.column, 3);
                assert_eq!(found, "$");
            }
        }
    }
}
