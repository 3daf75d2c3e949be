use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{ErrorKind, Result};
use crate::{EntryKind, ObjectId, SourceTree, TreeEntry};

#[derive(Debug, Default)]
struct Objects {
    trees: HashMap<ObjectId, Vec<TreeEntry>>,
    blobs: HashMap<ObjectId, Vec<u8>>,
    revisions: HashMap<String, ObjectId>,
}

#[derive(Default)]
struct Dir {
    dirs: BTreeMap<String, Dir>,
    files: BTreeMap<String, ObjectId>,
}

/// Content-addressed in-memory source, for tests and dry runs.
///
/// Ids are BLAKE3 hashes, so the same file content in two revisions is the
/// same blob. Revisions registered with
/// [`with_remote_revision`](Self::with_remote_revision) only resolve after
/// [`refresh`](SourceTree::refresh).
#[derive(Debug, Default)]
pub struct MemorySource {
    objects: RwLock<Objects>,
    remote: RwLock<Vec<(String, Vec<(String, Vec<u8>)>)>>,
    refreshes: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `revision` with the given `(path, content)` files.
    pub fn with_revision<P, C>(mut self, revision: &str, files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<String>,
        C: Into<Vec<u8>>,
    {
        let files: Vec<(String, Vec<u8>)> = files.into_iter().map(|(p, c)| (p.into(), c.into())).collect();
        Self::insert(self.objects.get_mut(), revision, files);
        self
    }

    /// Like [`with_revision`](Self::with_revision), but visible only after the
    /// next refresh.
    pub fn with_remote_revision<P, C>(mut self, revision: &str, files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<String>,
        C: Into<Vec<u8>>,
    {
        let files = files.into_iter().map(|(p, c)| (p.into(), c.into())).collect();
        self.remote.get_mut().push((revision.to_string(), files));
        self
    }

    /// Number of completed refreshes.
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    fn insert(objects: &mut Objects, revision: &str, files: Vec<(String, Vec<u8>)>) {
        let mut root = Dir::default();
        for (path, content) in files {
            let id = ObjectId::new(blake3::hash(&content).to_hex().to_string());
            objects.blobs.insert(id.clone(), content);
            let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
            let Some(name) = segments.pop() else { continue };
            let dir = segments
                .into_iter()
                .fold(&mut root, |dir, segment| dir.dirs.entry(segment.to_string()).or_default());
            dir.files.insert(name.to_string(), id);
        }
        let root = Self::store(objects, root);
        objects.revisions.insert(revision.to_string(), root);
    }

    fn store(objects: &mut Objects, dir: Dir) -> ObjectId {
        let mut entries = Vec::new();
        for (name, child) in dir.dirs {
            let id = Self::store(objects, child);
            entries.push(TreeEntry { name, id, kind: EntryKind::Tree });
        }
        for (name, id) in dir.files {
            entries.push(TreeEntry { name, id, kind: EntryKind::Blob });
        }
        let mut hasher = blake3::Hasher::new();
        for entry in &entries {
            let kind: &[u8] = match entry.kind {
                EntryKind::Tree => b"tree ",
                EntryKind::Blob => b"blob ",
            };
            hasher.update(kind);
            hasher.update(entry.name.as_bytes());
            hasher.update(b"\0");
            hasher.update(entry.id.as_str().as_bytes());
            hasher.update(b"\n");
        }
        let id = ObjectId::new(hasher.finalize().to_hex().to_string());
        objects.trees.insert(id.clone(), entries);
        id
    }
}

#[async_trait]
impl SourceTree for MemorySource {
    async fn resolve(&self, revision: &str) -> Result<Option<ObjectId>> {
        Ok(self.objects.read().await.revisions.get(revision).cloned())
    }

    async fn tree(&self, id: &ObjectId) -> Result<Vec<TreeEntry>> {
        match self.objects.read().await.trees.get(id) {
            Some(entries) => Ok(entries.clone()),
            None => exn::bail!(ErrorKind::ObjectNotFound(id.to_string())),
        }
    }

    async fn blob(&self, id: &ObjectId) -> Result<Vec<u8>> {
        match self.objects.read().await.blobs.get(id) {
            Some(content) => Ok(content.clone()),
            None => exn::bail!(ErrorKind::ObjectNotFound(id.to_string())),
        }
    }

    async fn refresh(&self) -> Result<()> {
        let pending = std::mem::take(&mut *self.remote.write().await);
        let mut objects = self.objects.write().await;
        for (revision, files) in pending {
            Self::insert(&mut objects, &revision, files);
        }
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
