//! Source tree providers.
//!
//! A provider resolves a revision to its root tree and lets the caller walk
//! it: trees list named children that are either sub-trees or blobs, and
//! blob ids double as content hashes (identical content, identical id).

pub mod error;
#[cfg(feature = "git")]
mod git;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
#[cfg(feature = "git")]
pub use crate::git::GitSource;
pub use crate::memory::MemorySource;

/// Hex id of a tree or blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub struct ObjectId(String);
impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Tree,
    Blob,
}

/// A named child of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub id: ObjectId,
    pub kind: EntryKind,
}

#[async_trait]
pub trait SourceTree: std::fmt::Debug + Send + Sync {
    /// Root tree of `revision`, or `None` if the provider does not know it.
    async fn resolve(&self, revision: &str) -> Result<Option<ObjectId>>;

    /// Children of a tree, in no particular order.
    async fn tree(&self, id: &ObjectId) -> Result<Vec<TreeEntry>>;

    async fn blob(&self, id: &ObjectId) -> Result<Vec<u8>>;

    /// Fetch remote updates so that newly pushed revisions resolve.
    async fn refresh(&self) -> Result<()>;
}

pub type SourceHandle = Arc<dyn SourceTree>;
