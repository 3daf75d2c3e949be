//! Errors from resolving revisions and reading trees or blobs.

use derive_more::{Display, Error};

/// A source error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for source operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A tree or blob id that the provider itself handed out is gone.
    #[display("object not found: {_0}")]
    ObjectNotFound(#[error(not(source))] String),
    /// The repository could not be opened or read.
    #[display("repository error: {_0}")]
    Repository(#[error(not(source))] String),
    /// Fetching remote updates failed.
    #[display("failed to fetch remote updates")]
    Fetch,
    /// A blocking task panicked or was cancelled.
    #[display("source task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch | Self::Task)
    }
}
