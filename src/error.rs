//! Error types for couchsql
//!
//! Every problem detected while reading options or selectors is reported
//! to the caller as one of two kinds. Both map to HTTP 400; the message is
//! part of the API contract and is surfaced verbatim.

use thiserror::Error;

/// HTTP status reported for every error raised by this crate
pub const STATUS_BAD_REQUEST: u16 = 400;

/// The main error type for couchsql operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed selector JSON or option value
    #[error("{message}")]
    Parse { message: String },

    /// Well-formed input that is logically inconsistent, such as a key range
    /// no row can satisfy
    #[error("{message}")]
    Validation { message: String },
}

/// Result type alias for couchsql operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// The HTTP status a server should answer with
    pub fn status(&self) -> u16 {
        match self {
            Error::Parse { .. } | Error::Validation { .. } => STATUS_BAD_REQUEST,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Parse { message } | Error::Validation { message } => message,
        }
    }
}

// =============================================================================
// Conversions from external error types
// =============================================================================

impl From<mango::ParseError> for Error {
    fn from(err: mango::ParseError) -> Self {
        Error::Parse {
            message: err.message,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse {
            message: err.to_string(),
        }
    }
}
