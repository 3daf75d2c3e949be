//! Shared handles for every workflow operation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use exn::ResultExt;
use strand_cache::Repository;
use strand_config::{PathRules, ProjectConfig};
use strand_extract::ExtractorHandle;
use strand_render::ExporterHandle;
use strand_source::SourceHandle;
use strand_storage::BackendHandle;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::error::{ErrorKind, Result, from_cache};

/// Default number of extraction units allowed to run at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// A configured project, bound to its database row and source provider.
#[derive(Debug)]
pub struct Project {
    id: i64,
    name: String,
    settings: ProjectConfig,
    rules: PathRules,
    targets: Vec<String>,
    source: SourceHandle,
}
impl Project {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &ProjectConfig {
        &self.settings
    }

    pub fn base_locale(&self) -> &str {
        &self.settings.base_locale
    }

    /// Required locales without the base locale.
    pub fn target_locales(&self) -> &[String] {
        &self.targets
    }

    /// Base locale followed by the target locales.
    pub fn export_locales(&self) -> Vec<String> {
        std::iter::once(self.settings.base_locale.clone()).chain(self.targets.iter().cloned()).collect()
    }

    pub(crate) fn rules(&self) -> &PathRules {
        &self.rules
    }

    pub(crate) fn source(&self) -> &SourceHandle {
        &self.source
    }
}

struct Inner {
    repo: Repository,
    projects: HashMap<i64, Arc<Project>>,
    names: HashMap<String, i64>,
    extractors: Vec<ExtractorHandle>,
    exporters: Vec<ExporterHandle>,
    artifacts: BackendHandle,
    tracker: TaskTracker,
    units: Semaphore,
}

/// Everything the workflow needs, cheap to clone into background tasks.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}
impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("projects", &self.inner.names)
            .field("artifacts", &self.inner.artifacts.name())
            .field("tasks", &self.inner.tracker.len())
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn builder(repo: Repository, artifacts: BackendHandle) -> ContextBuilder {
        ContextBuilder {
            repo,
            artifacts,
            extractors: strand_extract::builtin(),
            exporters: strand_render::builtin(),
            concurrency: DEFAULT_CONCURRENCY,
            projects: Vec::new(),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.inner.repo
    }

    pub fn project(&self, id: i64) -> Result<&Arc<Project>> {
        match self.inner.projects.get(&id) {
            Some(project) => Ok(project),
            None => exn::bail!(ErrorKind::ProjectNotFound(format!("#{id}"))),
        }
    }

    pub fn project_by_name(&self, name: &str) -> Result<&Arc<Project>> {
        match self.inner.names.get(name) {
            Some(id) => self.project(*id),
            None => exn::bail!(ErrorKind::ProjectNotFound(name.to_string())),
        }
    }

    pub fn projects(&self) -> impl Iterator<Item = &Arc<Project>> {
        self.inner.projects.values()
    }

    pub fn extractors(&self) -> &[ExtractorHandle] {
        &self.inner.extractors
    }

    pub(crate) fn exporters(&self) -> &[ExporterHandle] {
        &self.inner.exporters
    }

    pub(crate) fn exporter(&self, id: &str) -> Option<&ExporterHandle> {
        self.inner.exporters.iter().find(|e| e.id() == id)
    }

    pub(crate) fn artifacts(&self) -> &BackendHandle {
        &self.inner.artifacts
    }

    /// Permit to run one extraction unit.
    pub(crate) async fn unit_permit(&self) -> Result<SemaphorePermit<'_>> {
        self.inner.units.acquire().await.or_raise(|| ErrorKind::Shutdown)
    }

    /// Run `task` in the background, logging its failure.
    pub(crate) fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let span = tracing::info_span!("background", task = name);
        self.inner.tracker.spawn(
            async move {
                if let Err(err) = task.await {
                    tracing::error!(error = ?err, "Background task failed");
                }
            }
            .instrument(span),
        );
    }

    /// Wait until every background task, including tasks spawned while
    /// waiting, has finished.
    pub async fn settle(&self) {
        let tracker = &self.inner.tracker;
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }

    /// Number of background tasks still running.
    pub fn pending_tasks(&self) -> usize {
        self.inner.tracker.len()
    }
}

pub struct ContextBuilder {
    repo: Repository,
    artifacts: BackendHandle,
    extractors: Vec<ExtractorHandle>,
    exporters: Vec<ExporterHandle>,
    concurrency: usize,
    projects: Vec<(String, ProjectConfig, SourceHandle)>,
}

impl ContextBuilder {
    /// Replace the bundled extractors.
    pub fn extractors(mut self, extractors: Vec<ExtractorHandle>) -> Self {
        self.extractors = extractors;
        self
    }

    /// Replace the bundled exporters.
    pub fn exporters(mut self, exporters: Vec<ExporterHandle>) -> Self {
        self.exporters = exporters;
        self
    }

    /// Maximum number of extraction units running at once. Zero is treated as one.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn project(mut self, name: impl Into<String>, settings: ProjectConfig, source: SourceHandle) -> Self {
        self.projects.push((name.into(), settings, source));
        self
    }

    /// Register every project in the database and compile its path rules.
    pub async fn build(self) -> Result<Context> {
        let mut projects = HashMap::new();
        let mut names = HashMap::new();
        for (name, settings, source) in self.projects {
            let row = self.repo.ensure_project(&name).await.map_err(from_cache)?;
            let rules = settings.path_rules().or_raise(|| ErrorKind::InvalidProject(name.clone()))?;
            for id in &settings.cache_exports {
                if !self.exporters.iter().any(|e| e.id() == id) {
                    tracing::warn!(project = %name, exporter = %id, "Cached export format is not registered; ignoring");
                }
            }
            let project = Project {
                id: row.id,
                targets: settings.target_locales(),
                name: name.clone(),
                settings,
                rules,
                source,
            };
            names.insert(name, row.id);
            projects.insert(row.id, Arc::new(project));
        }
        Ok(Context {
            inner: Arc::new(Inner {
                repo: self.repo,
                projects,
                names,
                extractors: self.extractors,
                exporters: self.exporters,
                artifacts: self.artifacts,
                tracker: TaskTracker::new(),
                units: Semaphore::new(self.concurrency),
            }),
        })
    }
}
