//! Whitespace tokenizer with an end-of-input sentinel.

/// A search token. Every tokenized input ends with exactly one [`Token::End`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    End,
}

impl Token {
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Self::Word(word) => Some(word.as_str()),
            Self::End => None,
        }
    }

    /// True for `key:value` shaped words.
    pub fn is_directive_shaped(&self) -> bool {
        matches!(self, Self::Word(word) if word.contains(':'))
    }
}

pub fn tokenize(input: &str) -> Vec<Token> {
    input
        .split_whitespace()
        .map(|word| Token::Word(word.to_string()))
        .chain(std::iter::once(Token::End))
        .collect()
}

/// Words of `input` without the sentinel.
pub(crate) fn words(input: &str) -> Vec<String> {
    input.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_only_sentinel() {
        assert_eq!(tokenize(""), vec![Token::End]);
        assert_eq!(tokenize("   \t "), vec![Token::End]);
    }

    #[test]
    fn collapses_repeated_whitespace() {
        let tokens = tokenize("  sea   before:2022-03-01 ");
        assert_eq!(
            tokens,
            vec![
                Token::Word("sea".to_string()),
                Token::Word("before:2022-03-01".to_string()),
                Token::End,
            ]
        );
    }

    #[test]
    fn directive_shape_requires_colon() {
        assert!(Token::Word("on:2020-01-01".to_string()).is_directive_shaped());
        assert!(!Token::Word("reef".to_string()).is_directive_shaped());
        assert!(!Token::End.is_directive_shaped());
    }
}
