//! Fan-out of one blob to the extractors that want it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use exn::ResultExt;
use futures::FutureExt;
use strand_cache::{Blob, Commit, ExtractionTarget, LocaleSet};
use strand_extract::{ExtractorHandle, Request};
use strand_source::ObjectId;
use uuid::Uuid;

use crate::context::{Context, Project};
use crate::error::{ErrorKind, Result, from_cache};
use crate::import::{ImportOptions, ImportSummary};
use crate::workers;

/// State shared by every dispatch of one tree walk.
pub(crate) struct Scan<'a> {
    pub ctx: &'a Context,
    pub project: &'a Arc<Project>,
    pub commit: &'a Commit,
    /// Locale the found copy is written in.
    pub locale: &'a str,
    /// `locale` is the project's base locale.
    pub base: bool,
    pub options: &'a ImportOptions,
}

/// One extractor applied to one blob. Owns everything it needs so it can
/// move into a background task.
struct Unit {
    ctx: Context,
    project: Arc<Project>,
    extractor: ExtractorHandle,
    commit_id: i64,
    revision: String,
    blob_id: i64,
    object: ObjectId,
    path: String,
    locale: String,
    base: bool,
}

impl Unit {
    fn request(&self) -> Request<'_> {
        Request {
            path: &self.path,
            revision: &self.revision,
            locale: &self.locale,
            base: self.base,
        }
    }

    /// Extract and persist. Returns the number of keys or translations written.
    async fn run(&self) -> Result<u64> {
        let _permit = self.ctx.unit_permit().await?;
        let content = self.project.source().blob(&self.object).await.or_raise(|| ErrorKind::Source)?;
        let units = self.extractor.extract(&content, &self.request()).or_raise(|| ErrorKind::Extract)?;
        let repo = self.ctx.repository();
        let written = if self.base {
            let target = ExtractionTarget {
                project_id: self.project.id(),
                commit_id: self.commit_id,
                blob_id: self.blob_id,
                extractor: self.extractor.id(),
                source_path: &self.path,
            };
            let locales = LocaleSet {
                base: &self.locale,
                targets: self.project.target_locales(),
            };
            repo.record_extraction(target, locales, &units).await.map_err(from_cache)?
        } else {
            repo.record_locale_extraction(self.project.id(), &self.locale, &units).await.map_err(from_cache)?
        };
        Ok(written)
    }

    /// Run in the background. The worker token is released however the
    /// unit ends, panics included.
    fn schedule(self, job_id: String) {
        let ctx = self.ctx.clone();
        ctx.spawn("extract", async move {
            let outcome = AssertUnwindSafe(self.run()).catch_unwind().await;
            match outcome {
                Ok(Ok(written)) => {
                    tracing::debug!(extractor = self.extractor.id(), path = %self.path, written, "Extraction unit finished");
                }
                Ok(Err(err)) => {
                    tracing::warn!(extractor = self.extractor.id(), path = %self.path, error = ?err, "Extraction unit failed");
                }
                Err(_) => {
                    tracing::error!(extractor = self.extractor.id(), path = %self.path, "Extraction unit panicked");
                }
            }
            workers::remove_worker(&self.ctx, self.commit_id, &job_id).await.map(|_| ())
        });
    }
}

/// Offer a blob found at `path` to every extractor the project has not
/// opted out of.
pub(crate) async fn dispatch(
    scan: &Scan<'_>,
    blob: &Blob,
    object: &ObjectId,
    path: &str,
    summary: &mut ImportSummary,
) -> Result<()> {
    let repo = scan.ctx.repository();
    let request = Request {
        path,
        revision: &scan.commit.revision,
        locale: scan.locale,
        base: scan.base,
    };
    for extractor in scan.ctx.extractors() {
        let id = extractor.id();
        if scan.project.settings().skips_extractor(id) {
            continue;
        }
        if scan.options.force {
            repo.clear_extracted(blob.id, id).await.map_err(from_cache)?;
        }
        if extractor.skip(&request) {
            tracing::debug!(extractor = id, path, "Extractor declined");
            summary.declined += 1;
            continue;
        }
        // Only base-locale extraction leaves a marker.
        if scan.base && !scan.options.force && repo.is_extracted(blob.id, id).await.map_err(from_cache)? {
            let linked = repo.link_blob_keys(scan.commit.id, blob.id, id).await.map_err(from_cache)?;
            tracing::debug!(extractor = id, path, linked, "Reused keys of extracted blob");
            summary.reused += 1;
            continue;
        }

        let unit = Unit {
            ctx: scan.ctx.clone(),
            project: scan.project.clone(),
            extractor: extractor.clone(),
            commit_id: scan.commit.id,
            revision: scan.commit.revision.clone(),
            blob_id: blob.id,
            object: object.clone(),
            path: path.to_string(),
            locale: scan.locale.to_string(),
            base: scan.base,
        };
        if scan.options.inline {
            match unit.run().await {
                Ok(_) => summary.inline += 1,
                Err(err) => {
                    tracing::warn!(extractor = id, path, error = ?err, "Extraction unit failed");
                    summary.failed += 1;
                }
            }
        } else {
            // Registered before the unit can possibly finish.
            let job_id = Uuid::new_v4().to_string();
            workers::add_worker(scan.ctx, scan.commit.id, &job_id).await?;
            unit.schedule(job_id);
            summary.scheduled += 1;
        }
    }
    Ok(())
}
