//! Local git clones read through libgit2.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use exn::ResultExt;
use git2::{ErrorCode, ObjectType, Oid, Repository};
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::{EntryKind, ObjectId, SourceTree, TreeEntry};

/// Reads trees and blobs from a local clone.
///
/// `git2::Repository` is not `Sync`, so every call opens the repository on a
/// blocking thread.
#[derive(Debug, Clone)]
pub struct GitSource {
    path: PathBuf,
}

fn repository_error(err: &git2::Error) -> ErrorKind {
    ErrorKind::Repository(err.message().to_string())
}

fn oid(id: &ObjectId) -> Result<Oid> {
    Oid::from_str(id.as_str()).or_raise(|| ErrorKind::ObjectNotFound(id.to_string()))
}

impl GitSource {
    /// Fails if `path` is not a git repository.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        Repository::open(&path).map_err(|e| repository_error(&e))?;
        Ok(Self { path })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Repository) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let repo = Repository::open(&path).map_err(|e| repository_error(&e))?;
            f(&repo)
        })
        .await
        .or_raise(|| ErrorKind::Task)?
    }
}

#[async_trait]
impl SourceTree for GitSource {
    async fn resolve(&self, revision: &str) -> Result<Option<ObjectId>> {
        let revision = revision.to_string();
        self.blocking(move |repo| {
            let object = match repo.revparse_single(&revision) {
                Ok(object) => object,
                Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::Ambiguous | ErrorCode::InvalidSpec) => {
                    return Ok(None);
                }
                Err(e) => exn::bail!(repository_error(&e)),
            };
            let tree = object.peel_to_tree().map_err(|e| repository_error(&e))?;
            Ok(Some(ObjectId::new(tree.id().to_string())))
        })
        .await
    }

    async fn tree(&self, id: &ObjectId) -> Result<Vec<TreeEntry>> {
        let oid = oid(id)?;
        self.blocking(move |repo| {
            let tree = repo.find_tree(oid).or_raise(|| ErrorKind::ObjectNotFound(oid.to_string()))?;
            let entries = tree
                .iter()
                .filter_map(|entry| {
                    // Submodules (commit entries) and non-UTF-8 names are not walked.
                    let kind = match entry.kind()? {
                        ObjectType::Tree => EntryKind::Tree,
                        ObjectType::Blob => EntryKind::Blob,
                        _ => return None,
                    };
                    Some(TreeEntry {
                        name: entry.name()?.to_string(),
                        id: ObjectId::new(entry.id().to_string()),
                        kind,
                    })
                })
                .collect();
            Ok(entries)
        })
        .await
    }

    async fn blob(&self, id: &ObjectId) -> Result<Vec<u8>> {
        let oid = oid(id)?;
        self.blocking(move |repo| {
            let blob = repo.find_blob(oid).or_raise(|| ErrorKind::ObjectNotFound(oid.to_string()))?;
            Ok(blob.content().to_vec())
        })
        .await
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn refresh(&self) -> Result<()> {
        self.blocking(|repo| {
            let remotes = repo.remotes().map_err(|e| repository_error(&e))?;
            for name in remotes.iter().flatten() {
                let mut remote = repo.find_remote(name).map_err(|e| repository_error(&e))?;
                let no_refspecs: &[&str] = &[];
                remote.fetch(no_refspecs, None, None).or_raise(|| ErrorKind::Fetch)?;
                tracing::debug!(remote = name, "fetched remote");
            }
            Ok(())
        })
        .await
    }
}
