//! Extraction errors.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The blob is not valid UTF-8.
    #[display("blob is not valid UTF-8: {_0}")]
    Encoding(#[error(not(source))] String),
    /// The file could not be parsed in the extractor's format.
    #[display("malformed {format} file '{path}'")]
    Malformed {
        format: &'static str,
        path: String,
    },
    /// A string value was found where the format does not allow one.
    #[display("unexpected value for '{key}' in '{path}'")]
    UnexpectedValue {
        key: String,
        path: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Blob content is immutable; the same input fails the same way.
        false
    }
}
