use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Reserved words of LSL. Type names are tokenized separately as
/// [`Token::Type`](super::token::Token::Type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    Default,
    State,
    If,
    Else,
    While,
    Do,
    For,
    Return,
    Jump,
    Break,
    Continue,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_keyword_roundtrip() {
        for kw in Keyword::iter() {
            assert_eq!(Keyword::from_str(kw.as_ref()).unwrap(), kw);
        }
        assert!(Keyword::from_str("Default").is_err());
        assert!(Keyword::from_str("print").is_err());
    }
}
