use thiserror::Error;

use crate::token::{Token, TokenKind};

pub type ParseResult<T> = Result<T, ParseError>;

/// Everything that can stop the front end. There is no recovery: the first
/// error aborts the compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A character no token starts with.
    #[error("unknown character {ch:?} at byte {offset}")]
    UnknownCharacter { ch: char, offset: usize },

    #[error("integer literal {text} does not fit in 64 bits")]
    IntegerOverflow { text: String },

    /// A specific token (or token class) was required and something else
    /// was found.
    #[error("{expected} expected, found {found}")]
    Expected { expected: String, found: String },

    #[error("function {function} declares {count} parameters, at most 3 are supported")]
    TooManyParameters { function: String, count: usize },

    #[error("call to {function} passes {count} arguments, at most 3 are supported")]
    TooManyArguments { function: String, count: usize },

    /// Nesting limit exceeded (pathological input).
    #[error("nesting depth exceeds {limit}")]
    TooDeep { limit: usize },
}

impl ParseError {
    pub(crate) fn expected(expected: impl Into<String>, found: Option<&Token>) -> Self {
        ParseError::Expected {
            expected: expected.into(),
            found: match found {
                Some(tok) if tok.kind == TokenKind::Ident || tok.kind == TokenKind::IntLiteral => {
                    format!("{} `{}`", tok.kind, tok.text)
                }
                Some(tok) => format!("`{}`", tok.text),
                None => "end of input".to_string(),
            },
        }
    }

    /// True for errors raised while splitting text into tokens.
    pub fn is_lexical(&self) -> bool {
        matches!(
            self,
            ParseError::UnknownCharacter { .. } | ParseError::IntegerOverflow { .. }
        )
    }
}
