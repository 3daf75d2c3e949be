//! Content-addressed blob registry and per-extractor processing markers.

use crate::Repository;
use crate::error::{ErrorKind, Result};
use crate::models::Blob;
use exn::{OptionExt, ResultExt};
use time::UtcDateTime;
use tracing::instrument;

impl Repository {
    /// Find the blob registered for `(project_id, sha)`, registering it first if
    /// this is the first sighting.
    ///
    /// Concurrent callers racing on the same hash all receive the same row:
    /// the insert is a no-op on conflict and the loser re-fetches the winner.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_or_create_blob(&self, project_id: i64, sha: &str) -> Result<Blob> {
        let inserted: Option<Blob> = sqlx::query_as(include_str!("../queries/insert_blob.sql"))
            .bind(project_id)
            .bind(sha)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if let Some(blob) = inserted {
            return Ok(blob);
        }
        let existing: Option<Blob> = sqlx::query_as(include_str!("../queries/get_blob.sql"))
            .bind(project_id)
            .bind(sha)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        // Blobs are never deleted while a project exists, so the conflicting row
        // must still be there.
        existing.ok_or_raise(|| ErrorKind::InvalidData("blob vanished after insert conflict"))
    }

    pub async fn count_blobs(&self, project_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blobs WHERE project_id = ?")
            .bind(project_id)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("blob count"))
    }

    /// Has `extractor` already processed this blob?
    pub async fn is_extracted(&self, blob_id: i64, extractor: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM blob_extractions WHERE blob_id = ? AND extractor = ?")
            .bind(blob_id)
            .bind(extractor)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(found.is_some())
    }

    /// Forget that `extractor` processed this blob, so the next import extracts
    /// it again.
    pub async fn clear_extracted(&self, blob_id: i64, extractor: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blob_extractions WHERE blob_id = ? AND extractor = ?")
            .bind(blob_id)
            .bind(extractor)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    pub(crate) async fn mark_extracted_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        blob_id: i64,
        extractor: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO blob_extractions (blob_id, extractor, extracted_at) VALUES (?, ?, ?) \
             ON CONFLICT (blob_id, extractor) DO UPDATE SET extracted_at = excluded.extracted_at",
        )
        .bind(blob_id)
        .bind(extractor)
        .bind(UtcDateTime::now().unix_timestamp())
        .execute(&mut **tx)
        .await
        .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use crate::repo::tests::setup;
    use futures::future::join_all;

    #[tokio::test]
    async fn test_find_or_create_returns_existing() {
        let (repo, project) = setup().await;
        let first = repo.find_or_create_blob(project.id, "deadbeef").await.unwrap();
        let second = repo.find_or_create_blob(project.id, "deadbeef").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(repo.count_blobs(project.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_blobs_are_scoped_per_project() {
        let (repo, project) = setup().await;
        let other = repo.ensure_project("mobile").await.unwrap();
        let a = repo.find_or_create_blob(project.id, "deadbeef").await.unwrap();
        let b = repo.find_or_create_blob(other.id, "deadbeef").await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_discovery_creates_one_row() {
        // A file database so the inserts race on separate pooled connections.
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("strand.db")).await.unwrap();
        let repo = db.repository();
        let project = repo.ensure_project("web").await.unwrap();
        let tasks = (0..32).map(|_| {
            let repo = repo.clone();
            let project_id = project.id;
            tokio::spawn(async move { repo.find_or_create_blob(project_id, "cafebabe").await.unwrap() })
        });
        let blobs: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();
        assert!(blobs.windows(2).all(|pair| pair[0].id == pair[1].id));
        assert_eq!(repo.count_blobs(project.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_extraction_marker() {
        let (repo, project) = setup().await;
        let blob = repo.find_or_create_blob(project.id, "deadbeef").await.unwrap();
        assert!(!repo.is_extracted(blob.id, "json").await.unwrap());
        let mut tx = repo.pool.begin().await.unwrap();
        crate::Repository::mark_extracted_in_tx(&mut tx, blob.id, "json").await.unwrap();
        tx.commit().await.unwrap();
        assert!(repo.is_extracted(blob.id, "json").await.unwrap());
        assert!(!repo.is_extracted(blob.id, "properties").await.unwrap());
        assert!(repo.clear_extracted(blob.id, "json").await.unwrap());
        assert!(!repo.is_extracted(blob.id, "json").await.unwrap());
    }
}
