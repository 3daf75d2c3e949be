//! Readiness of commits.

use strand_cache::Recalculation;
use tracing::instrument;

use crate::cascade;
use crate::context::Context;
use crate::error::{Result, from_cache};

/// Recompute the counters and `ready` flag of a commit over its project's
/// required locales.
///
/// Cached exports of the commit are refreshed when `ready` flipped, or
/// always when `force` is set.
#[instrument(skip(ctx))]
pub async fn recalculate(ctx: &Context, commit_id: i64, force: bool) -> Result<Recalculation> {
    let commit = ctx.repository().require_commit(commit_id).await.map_err(from_cache)?;
    let project = ctx.project(commit.project_id)?;
    let recalculation =
        ctx.repository().recalculate_commit(commit_id, project.target_locales()).await.map_err(from_cache)?;
    if recalculation.ready_changed() {
        tracing::info!(
            commit_id,
            revision = %recalculation.commit.revision,
            ready = recalculation.commit.ready,
            "Readiness changed"
        );
    }
    if recalculation.ready_changed() || force {
        cascade::refresh_exports(ctx, &recalculation.commit).await?;
    }
    Ok(recalculation)
}

/// Is every key of the commit approved in `locale`?
pub async fn is_localized(ctx: &Context, commit_id: i64, locale: &str) -> Result<bool> {
    ctx.repository().is_localized(commit_id, locale).await.map_err(from_cache)
}

/// A translation of `key_id` was edited or reviewed: recalculate every
/// commit containing the key. Returns how many commits were recalculated.
#[instrument(skip(ctx))]
pub async fn translation_changed(ctx: &Context, key_id: i64) -> Result<usize> {
    let commits = ctx.repository().list_commit_ids_for_key(key_id).await.map_err(from_cache)?;
    for commit_id in &commits {
        recalculate(ctx, *commit_id, false).await?;
    }
    Ok(commits.len())
}
