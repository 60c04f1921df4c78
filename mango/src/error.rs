//! Error types for Mango selector parsing

use thiserror::Error;

/// Error that occurred while parsing a selector
///
/// The message is surfaced verbatim to API clients, so it carries no
/// decoration of its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Prefix the message with the operator or key that was being parsed,
    /// e.g. `$mod: divisor must be non-zero`.
    pub fn within(self, context: &str) -> Self {
        Self {
            message: format!("{}: {}", context, self.message),
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::new(err.to_string())
    }
}
