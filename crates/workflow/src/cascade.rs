//! Work that follows a drain or a readiness change.

use std::path::{Path, PathBuf};

use exn::{OptionExt, ResultExt};
use strand_cache::Commit;
use strand_render::Entry;
use strand_storage::error::ErrorKind as StorageErrorKind;
use tracing::instrument;

use crate::context::Context;
use crate::error::{ErrorKind, Result, from_cache};
use crate::readiness;

/// Storage prefix holding every cached export of a revision.
pub fn export_prefix(revision: &str) -> String {
    format!("exports/{revision}")
}

/// Schedule a recalculation of every commit of the project except `finished`.
///
/// Extraction under one commit can change keys shared with its siblings.
pub(crate) async fn schedule_siblings(ctx: &Context, project_id: i64, finished: i64) -> Result<usize> {
    let siblings = ctx.repository().list_sibling_commit_ids(project_id, finished).await.map_err(from_cache)?;
    tracing::debug!(project_id, siblings = siblings.len(), "Scheduling sibling recalculations");
    for &commit_id in &siblings {
        let task_ctx = ctx.clone();
        ctx.spawn("recalculate", async move {
            readiness::recalculate(&task_ctx, commit_id, false).await.map(|_| ())
        });
    }
    Ok(siblings.len())
}

/// Drop the cached exports of a commit and, if it is ready, schedule them to
/// be rendered again.
///
/// Everything under [`export_prefix`] is removed, as well as the artifact of
/// any registered exporter whose output path lies elsewhere.
pub(crate) async fn refresh_exports(ctx: &Context, commit: &Commit) -> Result<()> {
    let prefix = export_prefix(&commit.revision);
    let artifacts = ctx.artifacts();
    let mut removed = artifacts.delete_prefix(Path::new(&prefix)).await.or_raise(|| ErrorKind::Storage)?;
    for exporter in ctx.exporters() {
        let path = PathBuf::from(exporter.output_path(&commit.revision));
        if path.starts_with(&prefix) {
            continue;
        }
        match artifacts.delete(&path).await {
            Ok(()) => removed += 1,
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {}
            Err(err) => return Err(err.raise(ErrorKind::Storage)),
        }
    }
    if removed > 0 {
        tracing::debug!(revision = %commit.revision, removed, "Invalidated cached exports");
    }
    if !commit.ready {
        return Ok(());
    }
    let project = ctx.project(commit.project_id)?;
    for id in &project.settings().cache_exports {
        if ctx.exporter(id).is_none() {
            continue;
        }
        let task_ctx = ctx.clone();
        let exporter = id.clone();
        let commit_id = commit.id;
        ctx.spawn("export", async move { generate_export(&task_ctx, commit_id, &exporter).await.map(|_| ()) });
    }
    Ok(())
}

/// Render one export of a ready commit into artifact storage.
///
/// Returns the artifact path, or `None` if the commit stopped being ready
/// before the export ran.
#[instrument(skip(ctx))]
pub async fn generate_export(ctx: &Context, commit_id: i64, exporter_id: &str) -> Result<Option<String>> {
    let exporter = ctx.exporter(exporter_id).ok_or_raise(|| ErrorKind::UnknownExporter(exporter_id.to_string()))?;
    let repo = ctx.repository();
    let commit = repo.require_commit(commit_id).await.map_err(from_cache)?;
    if !commit.ready {
        tracing::debug!(revision = %commit.revision, "Commit no longer ready; skipping export");
        return Ok(None);
    }
    let project = ctx.project(commit.project_id)?;
    let entries: Vec<Entry> = repo
        .list_commit_translations(commit_id, &project.export_locales())
        .await
        .map_err(from_cache)?
        .into_iter()
        .map(Entry::from)
        .collect();
    let rendered = exporter.export_to_vec(&entries).or_raise(|| ErrorKind::Render)?;
    let path = exporter.output_path(&commit.revision);
    ctx.artifacts().write(Path::new(&path), &rendered).await.or_raise(|| ErrorKind::Storage)?;
    tracing::info!(revision = %commit.revision, path = %path, entries = entries.len(), "Export cached");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{harness_with, harness_with_exporters, settings};
    use crate::import::tests::insert;
    use crate::import::{ImportOptions, import_strings};
    use crate::readiness::translation_changed;
    use std::io::Write;
    use std::sync::Arc;
    use strand_config::ProjectConfig;
    use strand_render::{Exporter, ExporterHandle};
    use strand_source::MemorySource;
    use strand_storage::StorageBackend;

    fn cached_both() -> ProjectConfig {
        ProjectConfig {
            cache_exports: vec!["json".into(), "ndjson".into(), "xliff".into()],
            ..settings()
        }
    }

    async fn ready_commit(h: &crate::context::tests::Harness) -> (Commit, i64) {
        let commit = insert(&h.ctx, "web", "abc123").await;
        import_strings(&h.ctx, commit.id, ImportOptions { inline: true, ..ImportOptions::default() })
            .await
            .unwrap();
        let repo = h.ctx.repository();
        let key = &repo.find_keys(commit.project_id, "greeting").await.unwrap()[0];
        repo.update_translation(key.id, "de", Some("Hallo"), Some(true)).await.unwrap();
        repo.update_translation(key.id, "fr", Some("Bonjour"), Some(true)).await.unwrap();
        translation_changed(&h.ctx, key.id).await.unwrap();
        h.ctx.settle().await;
        (commit, key.id)
    }

    fn source() -> MemorySource {
        MemorySource::new().with_revision("abc123", [("en.json", r#"{"greeting": "Hello"}"#)])
    }

    #[tokio::test]
    async fn test_ready_commit_exports_every_cached_format() {
        let h = harness_with(source(), cached_both(), None).await;
        ready_commit(&h).await;
        assert_eq!(
            h.artifacts.paths().await,
            vec![PathBuf::from("exports/abc123/json.json"), PathBuf::from("exports/abc123/ndjson.ndjson")]
        );
        let json = h.artifacts.read(Path::new("exports/abc123/json.json")).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "de": {"greeting": "Hallo"},
                "en": {"greeting": "Hello"},
                "fr": {"greeting": "Bonjour"},
            })
        );
    }

    #[tokio::test]
    async fn test_losing_readiness_invalidates_exports() {
        let h = harness_with(source(), cached_both(), None).await;
        let (_, key_id) = ready_commit(&h).await;
        assert_eq!(h.artifacts.paths().await.len(), 2);

        h.ctx.repository().update_translation(key_id, "fr", Some("Salut"), None).await.unwrap();
        translation_changed(&h.ctx, key_id).await.unwrap();
        h.ctx.settle().await;
        assert!(h.artifacts.paths().await.is_empty());
    }

    #[derive(Debug)]
    struct FlatExporter;
    impl Exporter for FlatExporter {
        fn id(&self) -> &'static str {
            "flat"
        }

        fn extension(&self) -> &'static str {
            "txt"
        }

        fn output_path(&self, revision: &str) -> String {
            format!("flat/{revision}.txt")
        }

        fn export(&self, entries: &[Entry], w: &mut dyn Write) -> strand_render::error::Result<()> {
            for entry in entries {
                writeln!(w, "{} {} {}", entry.locale, entry.key, entry.copy)
                    .or_raise(|| strand_render::error::ErrorKind::Io)?;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_custom_output_path_is_invalidated() {
        let settings = ProjectConfig {
            cache_exports: vec!["flat".into()],
            ..settings()
        };
        let exporters: Vec<ExporterHandle> = vec![Arc::new(FlatExporter)];
        let h = harness_with_exporters(source(), settings, exporters).await;
        let (commit, key_id) = ready_commit(&h).await;
        assert!(h.ctx.repository().require_commit(commit.id).await.unwrap().ready);
        assert_eq!(h.artifacts.paths().await, vec![PathBuf::from("flat/abc123.txt")]);

        h.ctx.repository().update_translation(key_id, "fr", Some("Salut"), None).await.unwrap();
        translation_changed(&h.ctx, key_id).await.unwrap();
        h.ctx.settle().await;
        assert!(!h.ctx.repository().require_commit(commit.id).await.unwrap().ready);
        assert!(h.artifacts.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_export_skips_commit_that_is_not_ready() {
        let h = harness_with(source(), cached_both(), None).await;
        let commit = insert(&h.ctx, "web", "abc123").await;
        assert_eq!(generate_export(&h.ctx, commit.id, "json").await.unwrap(), None);

        let err = generate_export(&h.ctx, commit.id, "xliff").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownExporter(id) if id == "xliff"));
    }

    #[tokio::test]
    async fn test_siblings_exclude_finished_commit() {
        let h = harness_with(source(), settings(), None).await;
        let a = insert(&h.ctx, "web", "aaa").await;
        insert(&h.ctx, "web", "bbb").await;
        insert(&h.ctx, "web", "ccc").await;
        insert(&h.ctx, "mobile", "ddd").await;
        assert_eq!(schedule_siblings(&h.ctx, a.project_id, a.id).await.unwrap(), 2);
        h.ctx.settle().await;
        let project = h.ctx.project_by_name("mobile").unwrap();
        let mobile = &h.ctx.repository().list_commits_for_project(project.id()).await.unwrap()[0];
        assert!(!mobile.ready);
        assert!(!h.ctx.repository().require_commit(a.id).await.unwrap().ready);
    }
}
