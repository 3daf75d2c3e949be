//! Repository for projects and commits.
//!
//! Blob, key, worker registry and aggregate operations live in sibling
//! modules as further `impl Repository` blocks.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::commit::{date_timestamp, timestamp};
use crate::models::{Commit, CommitRow, NewCommit, Project};
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;

/// Access to all persisted workflow state.
///
/// Cloning is cheap (the pool is reference counted), so a clone can be moved
/// into every background task.
#[derive(Debug, Clone)]
pub struct Repository {
    pub(crate) pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Projects
    // =========================================================================

    /// Find the project row for `name`, creating it if needed.
    pub async fn ensure_project(&self, name: &str) -> Result<Project> {
        sqlx::query_as(include_str!("../queries/upsert_project.sql"))
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    // =========================================================================
    // Commits
    // =========================================================================

    /// Insert a commit.
    ///
    /// Returns [`ErrorKind::Constraint`] if the revision already exists in the
    /// project, including when a concurrent insert won the race.
    pub async fn insert_commit(&self, commit: &NewCommit) -> Result<Commit> {
        let result = sqlx::query_as::<_, CommitRow>(include_str!("../queries/insert_commit.sql"))
            .bind(commit.project_id)
            .bind(&commit.revision)
            .bind(&commit.message)
            .bind(timestamp(commit.committed_at))
            .bind(commit.priority.map(i64::from))
            .bind(commit.due_date.map(date_timestamp))
            .bind(commit.description.as_deref())
            .bind(timestamp(UtcDateTime::now()))
            .fetch_one(&self.pool)
            .await;
        match result {
            Ok(row) => row.try_into(),
            Err(e) if is_unique_violation(&e) => Err(e).or_raise(|| ErrorKind::Constraint("commit revision")),
            Err(e) => Err(e).or_raise(|| ErrorKind::Database),
        }
    }

    pub async fn get_commit(&self, id: i64) -> Result<Option<Commit>> {
        let row: Option<CommitRow> = sqlx::query_as(include_str!("../queries/get_commit.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Commit::try_from).transpose()
    }

    /// Like [`get_commit`](Self::get_commit), but a missing commit is an error.
    pub async fn require_commit(&self, id: i64) -> Result<Commit> {
        match self.get_commit(id).await? {
            Some(commit) => Ok(commit),
            None => exn::bail!(ErrorKind::CommitNotFound(id)),
        }
    }

    pub async fn get_commit_by_revision(&self, project_id: i64, revision: &str) -> Result<Option<Commit>> {
        let row: Option<CommitRow> = sqlx::query_as(include_str!("../queries/get_commit_by_revision.sql"))
            .bind(project_id)
            .bind(revision)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Commit::try_from).transpose()
    }

    /// All commits in a project, newest first.
    pub async fn list_commits_for_project(&self, project_id: i64) -> Result<Vec<Commit>> {
        let rows: Vec<CommitRow> = sqlx::query_as(include_str!("../queries/list_commits_for_project.sql"))
            .bind(project_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Commit::try_from).collect()
    }

    /// Ids of every commit in the project except `exclude`.
    pub async fn list_sibling_commit_ids(&self, project_id: i64, exclude: i64) -> Result<Vec<i64>> {
        sqlx::query_scalar("SELECT id FROM commits WHERE project_id = ? AND id != ? ORDER BY id")
            .bind(project_id)
            .bind(exclude)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use time::{Date, Month};

    pub(crate) async fn setup() -> (Repository, Project) {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = db.repository();
        let project = repo.ensure_project("web").await.unwrap();
        (repo, project)
    }

    pub(crate) fn new_commit(project: &Project, revision: &str) -> NewCommit {
        NewCommit {
            project_id: project.id,
            revision: revision.to_string(),
            message: "fix typo".to_string(),
            committed_at: UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
            priority: None,
            due_date: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_ensure_project_is_idempotent() {
        let (repo, project) = setup().await;
        let again = repo.ensure_project("web").await.unwrap();
        assert_eq!(project, again);
        let other = repo.ensure_project("mobile").await.unwrap();
        assert_ne!(project.id, other.id);
    }

    #[tokio::test]
    async fn test_insert_and_get_commit() {
        let (repo, project) = setup().await;
        let mut new = new_commit(&project, "abc123");
        new.priority = Some(1);
        new.due_date = Some(Date::from_calendar_date(2026, Month::December, 1).unwrap());
        let commit = repo.insert_commit(&new).await.unwrap();
        assert_eq!(commit.revision, "abc123");
        assert!(!commit.loading);
        assert!(!commit.ready);
        assert_eq!(commit.priority, Some(1));

        let fetched = repo.get_commit(commit.id).await.unwrap().unwrap();
        assert_eq!(fetched, commit);
        let by_revision = repo.get_commit_by_revision(project.id, "abc123").await.unwrap().unwrap();
        assert_eq!(by_revision.id, commit.id);
        assert!(repo.get_commit(commit.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_revision_is_constraint_error() {
        let (repo, project) = setup().await;
        repo.insert_commit(&new_commit(&project, "abc123")).await.unwrap();
        let err = repo.insert_commit(&new_commit(&project, "abc123")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Constraint(_)));

        // Same revision in another project is fine.
        let other = repo.ensure_project("mobile").await.unwrap();
        repo.insert_commit(&new_commit(&other, "abc123")).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_sibling_commit_ids() {
        let (repo, project) = setup().await;
        let a = repo.insert_commit(&new_commit(&project, "aaa")).await.unwrap();
        let b = repo.insert_commit(&new_commit(&project, "bbb")).await.unwrap();
        let c = repo.insert_commit(&new_commit(&project, "ccc")).await.unwrap();
        let other = repo.ensure_project("mobile").await.unwrap();
        repo.insert_commit(&new_commit(&other, "ddd")).await.unwrap();

        let siblings = repo.list_sibling_commit_ids(project.id, b.id).await.unwrap();
        assert_eq!(siblings, vec![a.id, c.id]);
    }
}
