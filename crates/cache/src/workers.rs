//! Outstanding extraction jobs per commit.
//!
//! Each mutation is one transaction whose first statement is a write, so it
//! takes SQLite's write lock up front (waiting out `busy_timeout` if another
//! connection holds it) and never has to upgrade a read snapshot. Inside the
//! transaction the remaining set is counted and `commits.loading` is set
//! from it, which keeps `loading == !workers.is_empty()` at every commit.

use crate::Repository;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::UtcDateTime;
use tracing::instrument;

/// Outcome of a change to a commit's worker set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerChange {
    /// Workers still registered after the change.
    pub remaining: u64,
    /// This change removed the last worker. At most one concurrent removal
    /// observes `true` for a given drain.
    pub drained: bool,
}

impl WorkerChange {
    pub fn loading(&self) -> bool {
        self.remaining > 0
    }
}

async fn remaining(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, commit_id: i64) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM commit_workers WHERE commit_id = ?")
        .bind(commit_id)
        .fetch_one(&mut **tx)
        .await
        .or_raise(|| ErrorKind::Database)?;
    u64::try_from(count).or_raise(|| ErrorKind::InvalidData("worker count"))
}

async fn set_loading(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, commit_id: i64, loading: bool) -> Result<()> {
    let result = sqlx::query("UPDATE commits SET loading = ? WHERE id = ?")
        .bind(loading)
        .bind(commit_id)
        .execute(&mut **tx)
        .await
        .or_raise(|| ErrorKind::Database)?;
    if result.rows_affected() == 0 {
        exn::bail!(ErrorKind::CommitNotFound(commit_id));
    }
    Ok(())
}

impl Repository {
    /// Register `job_id` as outstanding for the commit and mark it loading.
    ///
    /// Adding an already-registered id is a no-op.
    #[instrument(level = "debug", skip(self))]
    pub async fn add_worker(&self, commit_id: i64, job_id: &str) -> Result<WorkerChange> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        set_loading(&mut tx, commit_id, true).await?;
        sqlx::query("INSERT OR IGNORE INTO commit_workers (commit_id, job_id, added_at) VALUES (?, ?, ?)")
            .bind(commit_id)
            .bind(job_id)
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let remaining = remaining(&mut tx, commit_id).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(WorkerChange {
            remaining,
            drained: false,
        })
    }

    /// Deregister `job_id` and recompute `loading`.
    ///
    /// Removing an unknown id changes nothing and never reports a drain.
    #[instrument(level = "debug", skip(self))]
    pub async fn remove_worker(&self, commit_id: i64, job_id: &str) -> Result<WorkerChange> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let removed = sqlx::query("DELETE FROM commit_workers WHERE commit_id = ? AND job_id = ?")
            .bind(commit_id)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?
            .rows_affected();
        let remaining = remaining(&mut tx, commit_id).await?;
        set_loading(&mut tx, commit_id, remaining > 0).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(WorkerChange {
            remaining,
            drained: removed > 0 && remaining == 0,
        })
    }

    /// Drop every registered worker for the commit and clear `loading`.
    #[instrument(level = "debug", skip(self))]
    pub async fn clear_workers(&self, commit_id: i64) -> Result<WorkerChange> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let removed = sqlx::query("DELETE FROM commit_workers WHERE commit_id = ?")
            .bind(commit_id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?
            .rows_affected();
        set_loading(&mut tx, commit_id, false).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(WorkerChange {
            remaining: 0,
            drained: removed > 0,
        })
    }

    /// Registered job ids, oldest first.
    pub async fn list_workers(&self, commit_id: i64) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT job_id FROM commit_workers WHERE commit_id = ? ORDER BY added_at, job_id")
            .bind(commit_id)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::repo::tests::{new_commit, setup};
    use futures::future::join_all;

    #[tokio::test]
    async fn test_add_and_remove_toggle_loading() {
        let (repo, project) = setup().await;
        let commit = repo.insert_commit(&new_commit(&project, "abc123")).await.unwrap();

        let change = repo.add_worker(commit.id, "job-1").await.unwrap();
        assert!(change.loading());
        assert!(repo.get_commit(commit.id).await.unwrap().unwrap().loading);
        repo.add_worker(commit.id, "job-2").await.unwrap();

        let change = repo.remove_worker(commit.id, "job-1").await.unwrap();
        assert_eq!(change, WorkerChange { remaining: 1, drained: false });
        assert!(repo.get_commit(commit.id).await.unwrap().unwrap().loading);

        let change = repo.remove_worker(commit.id, "job-2").await.unwrap();
        assert_eq!(change, WorkerChange { remaining: 0, drained: true });
        assert!(!repo.get_commit(commit.id).await.unwrap().unwrap().loading);
    }

    #[tokio::test]
    async fn test_duplicate_add_and_unknown_remove() {
        let (repo, project) = setup().await;
        let commit = repo.insert_commit(&new_commit(&project, "abc123")).await.unwrap();
        repo.add_worker(commit.id, "job-1").await.unwrap();
        let change = repo.add_worker(commit.id, "job-1").await.unwrap();
        assert_eq!(change.remaining, 1);

        let change = repo.remove_worker(commit.id, "nope").await.unwrap();
        assert_eq!(change, WorkerChange { remaining: 1, drained: false });

        repo.remove_worker(commit.id, "job-1").await.unwrap();
        // A second removal of the same id is not a second drain.
        let change = repo.remove_worker(commit.id, "job-1").await.unwrap();
        assert!(!change.drained);
    }

    #[tokio::test]
    async fn test_clear_workers() {
        let (repo, project) = setup().await;
        let commit = repo.insert_commit(&new_commit(&project, "abc123")).await.unwrap();
        repo.add_worker(commit.id, "a").await.unwrap();
        repo.add_worker(commit.id, "b").await.unwrap();
        assert_eq!(repo.list_workers(commit.id).await.unwrap().len(), 2);

        let change = repo.clear_workers(commit.id).await.unwrap();
        assert!(change.drained);
        assert!(!change.loading());
        assert!(repo.list_workers(commit.id).await.unwrap().is_empty());
        assert!(!repo.get_commit(commit.id).await.unwrap().unwrap().loading);
    }

    #[tokio::test]
    async fn test_missing_commit() {
        let (repo, _) = setup().await;
        let err = repo.add_worker(404, "job").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::CommitNotFound(404)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_exactly_one_concurrent_removal_drains() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("strand.db")).await.unwrap();
        let repo = db.repository();
        let project = repo.ensure_project("web").await.unwrap();
        let commit = repo.insert_commit(&new_commit(&project, "abc123")).await.unwrap();
        let jobs: Vec<String> = (0..24).map(|i| format!("job-{i}")).collect();
        for job in &jobs {
            repo.add_worker(commit.id, job).await.unwrap();
        }

        let tasks = jobs.into_iter().map(|job| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.remove_worker(commit.id, &job).await.unwrap() })
        });
        let changes: Vec<WorkerChange> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(changes.iter().filter(|c| c.drained).count(), 1);
        assert!(!repo.get_commit(commit.id).await.unwrap().unwrap().loading);
    }
}
