//! Storage backend trait and implementations.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::local::LocalBackend;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockBackend;
use crate::FileInfo;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for artifact storage.
///
/// All paths are relative to the storage root and are validated with
/// [`validate_path`](crate::validate_path) by every implementation.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, for logging.
    fn name(&self) -> &str;

    /// Collect [`list_stream()`](Self::list_stream) into a [`Vec`].
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream metadata of every artifact whose path starts with `prefix`
    /// (component-wise). A prefix that does not exist yields nothing.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Returns [`NotFound`](ErrorKind::NotFound) if the artifact does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or overwrite an artifact, creating parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Returns [`NotFound`](ErrorKind::NotFound) if the artifact does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Delete every artifact under `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &Path) -> Result<usize> {
        let mut removed = 0;
        for info in self.list(Some(prefix)).await? {
            match self.delete(&info.path).await {
                Ok(()) => removed += 1,
                // Deleted concurrently.
                Err(err) if matches!(&*err, ErrorKind::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(removed)
    }
}
