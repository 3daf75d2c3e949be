pub(crate) mod commit;
mod key;

pub use self::commit::{Commit, CommitStats, NewCommit};
pub(crate) use self::commit::CommitRow;
pub use self::key::{Key, Translation};
pub(crate) use self::key::{KeyRow, TranslationRow};

/// A localization project. Settings live in configuration; the row anchors ids.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

/// A unique piece of content within a project, identified by its hash.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Blob {
    pub id: i64,
    pub project_id: i64,
    pub sha: String,
}
