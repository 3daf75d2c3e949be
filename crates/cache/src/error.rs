//! Errors raised by the SQLite cache.
//!
//! Query failures keep the `sqlx` error as the source; not-found and
//! constraint cases get their own kinds so callers can branch on them.

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A uniqueness constraint rejected the write.
    #[display("constraint violation: {_0}")]
    Constraint(#[error(not(source))] &'static str),
    #[display("commit not found: {_0}")]
    CommitNotFound(#[error(not(source))] i64),
    /// Serialization/deserialization error.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // SQLITE_BUSY surfaces as a generic database error.
        matches!(self, Self::Database)
    }
}
