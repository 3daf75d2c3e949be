//! Commit readiness and aggregate counters, recomputed from scratch.

use crate::Repository;
use crate::error::{ErrorKind, Result};
use crate::models::{Commit, CommitRow};
use exn::{OptionExt, ResultExt};
use time::UtcDateTime;
use tracing::instrument;

/// Result of a recalculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recalculation {
    /// `ready` as persisted before this run.
    pub previous_ready: bool,
    /// The commit with its recomputed state.
    pub commit: Commit,
}

impl Recalculation {
    pub fn ready_changed(&self) -> bool {
        self.previous_ready != self.commit.ready
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    translations_total: i64,
    translations_done: i64,
    translations_new: i64,
    translations_pending: i64,
    words_new: i64,
    words_pending: i64,
}

impl Repository {
    /// Recompute the commit's counters and `ready` flag over `target_locales`
    /// (required locales without the base locale) and persist them.
    ///
    /// The whole read-compute-write runs in one transaction opened with a
    /// write, so concurrent runs for the same commit serialise and the last
    /// one to commit reflects the latest state. Running it again with
    /// unchanged data persists the same values.
    #[instrument(skip(self, target_locales))]
    pub async fn recalculate_commit(&self, commit_id: i64, target_locales: &[String]) -> Result<Recalculation> {
        let locales = serde_json::to_string(target_locales).or_raise(|| ErrorKind::InvalidData("locales"))?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let previous_ready: Option<bool> =
            sqlx::query_scalar("UPDATE commits SET recalculated_at = ? WHERE id = ? RETURNING ready")
                .bind(UtcDateTime::now().unix_timestamp())
                .bind(commit_id)
                .fetch_optional(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        let previous_ready = previous_ready.ok_or_raise(|| ErrorKind::CommitNotFound(commit_id))?;

        let stats: StatsRow = sqlx::query_as(include_str!("../queries/commit_stats.sql"))
            .bind(commit_id)
            .bind(&locales)
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let unready: i64 = sqlx::query_scalar(include_str!("../queries/commit_unready_count.sql"))
            .bind(commit_id)
            .bind(&locales)
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;

        let row: CommitRow = sqlx::query_as(include_str!("../queries/update_commit_stats.sql"))
            .bind(unready == 0)
            .bind(stats.translations_total)
            .bind(stats.translations_done)
            .bind(stats.translations_new)
            .bind(stats.translations_pending)
            .bind(stats.words_new)
            .bind(stats.words_pending)
            .bind(commit_id)
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(Recalculation {
            previous_ready,
            commit: row.try_into()?,
        })
    }

    /// Is every key of the commit approved in `locale`?
    pub async fn is_localized(&self, commit_id: i64, locale: &str) -> Result<bool> {
        let locales = serde_json::to_string(&[locale]).or_raise(|| ErrorKind::InvalidData("locales"))?;
        let unready: i64 = sqlx::query_scalar(include_str!("../queries/commit_unready_count.sql"))
            .bind(commit_id)
            .bind(locales)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(unready == 0)
    }
}
