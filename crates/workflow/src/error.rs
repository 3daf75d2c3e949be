//! Workflow errors.
//!
//! Errors from the lower crates are raised under one of the coarse kinds
//! below, so the full tree stays available for reporting.

use derive_more::{Display, Error};

/// A workflow error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for workflow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The request was rejected; fix the named field and resubmit.
    #[display("invalid commit: {_0}")]
    Validation(ValidationError),
    /// The source provider does not know the revision, even after fetching.
    #[display("snapshot unavailable: revision {_0} not found")]
    SnapshotUnavailable(#[error(not(source))] String),
    #[display("commit not found: {_0}")]
    CommitNotFound(#[error(not(source))] i64),
    /// No commit with this revision exists in the project.
    #[display("no commit for revision {_0}")]
    UnknownRevision(#[error(not(source))] String),
    #[display("project not configured: {_0}")]
    ProjectNotFound(#[error(not(source))] String),
    /// Project settings passed config validation but could not be applied.
    #[display("invalid settings for project {_0}")]
    InvalidProject(#[error(not(source))] String),
    /// No exporter is registered under the id.
    #[display("unknown exporter: {_0}")]
    UnknownExporter(#[error(not(source))] String),
    #[display("persistence error")]
    Cache,
    #[display("source tree error")]
    Source,
    #[display("extraction error")]
    Extract,
    #[display("artifact storage error")]
    Storage,
    #[display("export rendering error")]
    Render,
    /// The context is shutting down and no longer accepts work.
    #[display("workflow is shutting down")]
    Shutdown,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A revision may be pushed later; persistence and source errors are
        // usually transient (busy database, network).
        matches!(self, Self::SnapshotUnavailable(_) | Self::Cache | Self::Source | Self::Storage)
    }
}

/// Wrap a cache error, keeping a missing commit distinguishable.
#[track_caller]
pub(crate) fn from_cache(err: strand_cache::error::Error) -> Error {
    let kind = match &*err {
        strand_cache::error::ErrorKind::CommitNotFound(id) => ErrorKind::CommitNotFound(*id),
        _ => ErrorKind::Cache,
    };
    err.raise(kind)
}

/// A rejected commit field.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[display("revision is required")]
    MissingRevision,
    #[display("revision {_0} already exists in this project")]
    DuplicateRevision(#[error(not(source))] String),
    #[display("revision {_0:?} is not a lowercase hex id of at most 40 characters")]
    InvalidRevision(#[error(not(source))] String),
    #[display("message is required")]
    MissingMessage,
    #[display("message is {_0} characters long; the limit is 256")]
    MessageTooLong(#[error(not(source))] usize),
    #[display("priority {_0} is outside 0..=3")]
    PriorityOutOfRange(#[error(not(source))] i64),
    #[display("committed-at {_0:?} is not an RFC 3339 timestamp")]
    InvalidCommittedAt(#[error(not(source))] String),
    #[display("due date {_0:?} is not a YYYY-MM-DD date")]
    InvalidDueDate(#[error(not(source))] String),
}
