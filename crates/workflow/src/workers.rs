//! Worker registry protocol.
//!
//! The cache serialises every registry change and reports whether it drained
//! the set. Whoever observes the drain runs the last-worker-out sequence: a
//! synchronous recalculation of the commit, then background recalculations
//! of every other commit in the project.

use strand_cache::{Recalculation, WorkerChange};
use tracing::instrument;

use crate::cascade;
use crate::context::Context;
use crate::error::{Result, from_cache};
use crate::readiness;

/// Register an outstanding job and mark the commit loading.
pub async fn add_worker(ctx: &Context, commit_id: i64, job_id: &str) -> Result<WorkerChange> {
    ctx.repository().add_worker(commit_id, job_id).await.map_err(from_cache)
}

/// Deregister a job; the removal that empties the set runs the
/// last-worker-out sequence before returning.
pub async fn remove_worker(ctx: &Context, commit_id: i64, job_id: &str) -> Result<WorkerChange> {
    let change = ctx.repository().remove_worker(commit_id, job_id).await.map_err(from_cache)?;
    if change.drained {
        tracing::info!(commit_id, "Last worker out");
        last_worker_out(ctx, commit_id).await?;
    }
    Ok(change)
}

/// Forget every registered job of a stuck commit. If any were registered, the
/// commit is recalculated as if the last of them had finished.
#[instrument(skip(ctx))]
pub async fn clear_workers(ctx: &Context, commit_id: i64) -> Result<WorkerChange> {
    let change = ctx.repository().clear_workers(commit_id).await.map_err(from_cache)?;
    if change.drained {
        tracing::warn!(commit_id, "Cleared outstanding workers");
        last_worker_out(ctx, commit_id).await?;
    }
    Ok(change)
}

async fn last_worker_out(ctx: &Context, commit_id: i64) -> Result<Recalculation> {
    let recalculation = readiness::recalculate(ctx, commit_id, false).await?;
    cascade::schedule_siblings(ctx, recalculation.commit.project_id, commit_id).await?;
    Ok(recalculation)
}
