//! Walking a commit's source tree.

use std::sync::Arc;

use exn::ResultExt;
use strand_cache::Commit;
use strand_source::{EntryKind, ObjectId, SourceTree};
use tracing::instrument;
use uuid::Uuid;

use crate::context::{Context, Project};
use crate::dispatch::{Scan, dispatch};
use crate::error::{ErrorKind, Result, from_cache};
use crate::workers;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Treat found copy as this locale instead of the project's base locale.
    /// Keys already linked to the commit are kept.
    pub locale: Option<String>,
    /// Extract on the calling task instead of scheduling background units.
    pub inline: bool,
    /// Ignore "already extracted" markers.
    pub force: bool,
}

/// What one walk did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Blobs offered to extractors.
    pub blobs: u64,
    /// Blobs excluded by path rules.
    pub filtered: u64,
    /// Extractors that declined a blob.
    pub declined: u64,
    /// Blobs whose previously extracted keys were linked without extracting.
    pub reused: u64,
    /// Extraction units run on the calling task.
    pub inline: u64,
    /// Extraction units scheduled in the background.
    pub scheduled: u64,
    /// Inline extraction units that failed.
    pub failed: u64,
}

/// Root tree of the revision, fetching remote updates once if it is unknown.
async fn resolve(source: &dyn SourceTree, revision: &str) -> Result<ObjectId> {
    if let Some(root) = source.resolve(revision).await.or_raise(|| ErrorKind::Source)? {
        return Ok(root);
    }
    tracing::info!(revision, "Revision not found locally; fetching");
    source.refresh().await.or_raise(|| ErrorKind::Source)?;
    match source.resolve(revision).await.or_raise(|| ErrorKind::Source)? {
        Some(root) => Ok(root),
        None => exn::bail!(ErrorKind::SnapshotUnavailable(revision.to_string())),
    }
}

/// Discover the keys of a commit and schedule their extraction.
///
/// Without `options.locale` the commit's key associations are cleared first,
/// so the walk alone decides which keys the commit has. The walk holds its
/// own worker token, so the commit stays `loading` until both the walk and
/// every unit it scheduled are done, and readiness is recalculated exactly
/// once afterwards.
#[instrument(skip(ctx, options), fields(locale = options.locale.as_deref(), inline = options.inline, force = options.force))]
pub async fn import_strings(ctx: &Context, commit_id: i64, options: ImportOptions) -> Result<ImportSummary> {
    let repo = ctx.repository();
    let commit = repo.require_commit(commit_id).await.map_err(from_cache)?;
    let project = ctx.project(commit.project_id)?.clone();
    let root = resolve(project.source().as_ref(), &commit.revision).await?;

    let token = format!("walk:{}", Uuid::new_v4());
    workers::add_worker(ctx, commit_id, &token).await?;
    let walked = walk(ctx, &project, &commit, root, &options).await;
    let released = workers::remove_worker(ctx, commit_id, &token).await;
    let summary = walked?;
    released?;
    tracing::info!(
        blobs = summary.blobs,
        scheduled = summary.scheduled,
        inline = summary.inline,
        reused = summary.reused,
        "Tree walk finished"
    );
    Ok(summary)
}

async fn walk(
    ctx: &Context,
    project: &Arc<Project>,
    commit: &Commit,
    root: ObjectId,
    options: &ImportOptions,
) -> Result<ImportSummary> {
    let repo = ctx.repository();
    if options.locale.is_none() {
        let cleared = repo.clear_commit_keys(commit.id).await.map_err(from_cache)?;
        tracing::debug!(cleared, "Cleared commit keys for full scan");
    }
    let locale = options.locale.as_deref().unwrap_or(project.base_locale());
    let scan = Scan {
        ctx,
        project,
        commit,
        locale,
        base: locale == project.base_locale(),
        options,
    };

    let mut summary = ImportSummary::default();
    let mut pending = vec![(String::new(), root)];
    while let Some((prefix, tree)) = pending.pop() {
        let entries = project.source().tree(&tree).await.or_raise(|| ErrorKind::Source)?;
        for entry in entries {
            let path = if prefix.is_empty() { entry.name } else { format!("{prefix}/{}", entry.name) };
            match entry.kind {
                EntryKind::Tree => pending.push((path, entry.id)),
                EntryKind::Blob if !project.rules().allows(&path) => {
                    tracing::trace!(path = %path, "Path excluded");
                    summary.filtered += 1;
                }
                EntryKind::Blob => {
                    let blob = repo.find_or_create_blob(project.id(), entry.id.as_str()).await.map_err(from_cache)?;
                    summary.blobs += 1;
                    dispatch(&scan, &blob, &entry.id, &path, &mut summary).await?;
                }
            }
        }
    }
    Ok(summary)
}
