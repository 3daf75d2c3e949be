use std::path::PathBuf;
use time::OffsetDateTime;

/// Metadata of a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative to the storage root.
    pub path: PathBuf,
    pub size: u64,
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
        }
    }
}
