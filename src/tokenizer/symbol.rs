//! # Symbol Token Handling
//!
//! Operators and delimiters of LSL.
//!
//! Symbols are matched longest first so that `<<=`-style prefixes such as
//! `<=` and `<<` are never split into `<` followed by another token.

use std::fmt;

use strum_macros::{AsRefStr, Display, EnumString};

use nom::{
    branch::alt,
    bytes::complete::tag,
    combinator::{map, value},
    error::context,
};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Operator {
    #[strum(serialize = "++")]
    Increment,
    #[strum(serialize = "--")]
    Decrement,
    #[strum(serialize = "+=")]
    PlusAssign,
    #[strum(serialize = "-=")]
    MinusAssign,
    #[strum(serialize = "*=")]
    MultiplyAssign,
    #[strum(serialize = "/=")]
    DivideAssign,
    #[strum(serialize = "%=")]
    ModuloAssign,
    #[strum(serialize = "==")]
    EqualEqual,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = "<<")]
    ShiftLeft,
    #[strum(serialize = ">>")]
    ShiftRight,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,

    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulo,
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "~")]
    Tilde,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "^")]
    BitXor,
    /// Member access (`v.x`)
    #[strum(serialize = ".")]
    Dot,
    /// Label marker (`@label;`)
    #[strum(serialize = "@")]
    At,
}

/// Brace text kept out of strum attributes, whose `Display` derive reads
/// braces as format placeholders.
const OPEN_BRACE: &str = "{";
const CLOSE_BRACE: &str = "}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Comma,
    Semicolon,
    Colon,
}

impl Delimiter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Delimiter::OpenBrace => OPEN_BRACE,
            Delimiter::CloseBrace => CLOSE_BRACE,
            Delimiter::OpenParen => "(",
            Delimiter::CloseParen => ")",
            Delimiter::OpenBracket => "[",
            Delimiter::CloseBracket => "]",
            Delimiter::Comma => ",",
            Delimiter::Semicolon => ";",
            Delimiter::Colon => ":",
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn compound_operator(input: &str) -> ParserResult<Operator> {
    alt((
        value(Operator::Increment, tag("++")),
        value(Operator::Decrement, tag("--")),
        value(Operator::PlusAssign, tag("+=")),
        value(Operator::MinusAssign, tag("-=")),
        value(Operator::MultiplyAssign, tag("*=")),
        value(Operator::DivideAssign, tag("/=")),
        value(Operator::ModuloAssign, tag("%=")),
        value(Operator::EqualEqual, tag("==")),
        value(Operator::NotEqual, tag("!=")),
        value(Operator::GreaterEqual, tag(">=")),
        value(Operator::LessEqual, tag("<=")),
        value(Operator::ShiftLeft, tag("<<")),
        value(Operator::ShiftRight, tag(">>")),
        value(Operator::And, tag("&&")),
        value(Operator::Or, tag("||")),
    ))(input)
}

fn single_operator(input: &str) -> ParserResult<Operator> {
    alt((
        value(Operator::Assign, tag("=")),
        value(Operator::Greater, tag(">")),
        value(Operator::Less, tag("<")),
        value(Operator::Plus, tag("+")),
        value(Operator::Minus, tag("-")),
        value(Operator::Multiply, tag("*")),
        value(Operator::Divide, tag("/")),
        value(Operator::Modulo, tag("%")),
        value(Operator::Not, tag("!")),
        value(Operator::Tilde, tag("~")),
        value(Operator::BitAnd, tag("&")),
        value(Operator::BitOr, tag("|")),
        value(Operator::BitXor, tag("^")),
        value(Operator::Dot, tag(".")),
        value(Operator::At, tag("@")),
    ))(input)
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_operator(input: &str) -> ParserResult<Token> {
    context(
        "operator",
        map(alt((compound_operator, single_operator)), Token::Operator),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_delimiter(input: &str) -> ParserResult<Token> {
    context(
        "delimiter",
        map(
            alt((
                value(Delimiter::OpenBrace, tag(OPEN_BRACE)),
                value(Delimiter::CloseBrace, tag(CLOSE_BRACE)),
                value(Delimiter::OpenParen, tag("(")),
                value(Delimiter::CloseParen, tag(")")),
                value(Delimiter::OpenBracket, tag("[")),
                value(Delimiter::CloseBracket, tag("]")),
                value(Delimiter::Comma, tag(",")),
                value(Delimiter::Semicolon, tag(";")),
                value(Delimiter::Colon, tag(":")),
            )),
            Token::Delimiter,
        ),
    )(input)
}
