use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, tag_no_case, take_while1},
    character::complete::{anychar, char, digit0, digit1, one_of},
    combinator::{map, opt, recognize},
    error::context,
    multi::fold_many0,
    sequence::{delimited, pair, preceded, tuple},
};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i32),
    Float(f64),
    String(String),
}

enum StringFragment<'a> {
    Raw(&'a str),
    Escaped(char),
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_escape(input: &str) -> ParserResult<StringFragment> {
    context(
        "escape sequence",
        map(preceded(char('\\'), anychar), |c| {
            StringFragment::Escaped(match c {
                'n' => '\n',
                't' => '\t',
                other => other,
            })
        }),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    context(
        "string literal",
        map(
            delimited(
                char('"'),
                fold_many0(
                    alt((map(is_not("\\\""), StringFragment::Raw), parse_escape)),
                    String::new,
                    |mut acc, fragment| {
                        match fragment {
                            StringFragment::Raw(s) => acc.push_str(s),
                            StringFragment::Escaped(c) => acc.push(c),
                        }
                        acc
                    },
                ),
                char('"'),
            ),
            Literal::String,
        ),
    )(input)
}

fn exponent(input: &str) -> ParserResult<&str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

fn float_text(input: &str) -> ParserResult<&str> {
    context(
        "float literal",
        alt((
            // 1.  1.5  1.5e3
            recognize(tuple((digit1, char('.'), digit0, opt(exponent)))),
            // .5  .5e-2
            recognize(tuple((char('.'), digit1, opt(exponent)))),
            // 1e3
            recognize(pair(digit1, exponent)),
        )),
    )(input)
}

fn float_suffix(input: &str) -> ParserResult<Option<char>> {
    opt(one_of("fF"))(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_float_literal(input: &str) -> ParserResult<Literal> {
    let (rest, text) = float_text(input)?;
    let (rest, _) = float_suffix(rest)?;
    let value = text.parse::<f64>().unwrap_or(0.0);
    Ok((rest, Literal::Float(value)))
}

/// Integer literals wrap to 32 bits; decimal literals too large for 32 bits
/// become `-1`.
#[tracing::instrument(level = "debug", skip(input))]
fn parse_integer_literal(input: &str) -> ParserResult<Literal> {
    context(
        "integer literal",
        alt((
            map(
                preceded(
                    tag_no_case("0x"),
                    take_while1(|c: char| c.is_ascii_hexdigit()),
                ),
                |hex: &str| {
                    let value = u64::from_str_radix(hex, 16).unwrap_or(u64::MAX);
                    Literal::Integer(clamp_u64(value))
                },
            ),
            map(digit1, |digits: &str| {
                let value = digits.parse::<u64>().unwrap_or(u64::MAX);
                Literal::Integer(clamp_u64(value))
            }),
        )),
    )(input)
}

fn clamp_u64(value: u64) -> i32 {
    if value > u32::MAX as u64 {
        -1
    } else {
        value as u32 as i32
    }
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_literal(input: &str) -> ParserResult<Token> {
    context(
        "literal",
        map(
            alt((
                parse_string_literal,
                parse_float_literal,
                parse_integer_literal,
            )),
            Token::Literal,
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(input: &str) -> (&str, Literal) {
        match parse_literal(input).unwrap() {
            (rest, Token::Literal(l)) => (rest, l),
            other => panic!("not a literal: {:?}", other),
        }
    }

    #[test]
    fn test_integer_literal() {
        assert_eq!(lit("42;"), (";", Literal::Integer(42)));
        assert_eq!(lit("0xFF"), ("", Literal::Integer(255)));
        assert_eq!(lit("0xFFFFFFFF"), ("", Literal::Integer(-1)));
        assert_eq!(lit("2147483648"), ("", Literal::Integer(i32::MIN)));
        assert_eq!(lit("99999999999"), ("", Literal::Integer(-1)));
    }

    #[test]
    fn test_float_literal() {
        assert_eq!(lit("1.5 "), (" ", Literal::Float(1.5)));
        assert_eq!(lit("1."), ("", Literal::Float(1.0)));
        assert_eq!(lit(".25"), ("", Literal::Float(0.25)));
        assert_eq!(lit("1e3"), ("", Literal::Float(1000.0)));
        assert_eq!(lit("2.5e-1f"), ("", Literal::Float(0.25)));
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(lit(r#""hello" x"#), (" x", Literal::String("hello".into())));
        assert_eq!(lit(r#""""#), ("", Literal::String(String::new())));
        assert_eq!(
            lit(r#""a\"b\\c\nd""#),
            ("", Literal::String("a\"b\\c\nd".into()))
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(parse_literal("\"abc").is_err());
    }
}
