//! Per-project extraction settings.

use crate::error::{ErrorKind, Result};
use crate::locale::is_valid_locale;
use exn::ResultExt;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for a single project, keyed by project name in [`Config`](crate::Config).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Location of a local clone, used by the git source provider.
    pub repository: Option<std::path::PathBuf>,
    /// Locale the source copy is written in.
    pub base_locale: String,
    /// Locales that must be approved before a commit is considered ready.
    pub required_locales: Vec<String>,
    /// Glob patterns a path must match to be scanned. Empty matches everything.
    pub only_paths: Vec<String>,
    /// Glob patterns excluding paths from scanning. Wins over `only_paths`.
    pub skip_paths: Vec<String>,
    /// Extractor identifiers this project opts out of.
    pub skip_extractors: Vec<String>,
    /// Exporter identifiers whose output is cached once a commit is ready.
    pub cache_exports: Vec<String>,
}
impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            repository: None,
            base_locale: "en".to_string(),
            required_locales: Vec::new(),
            only_paths: Vec::new(),
            skip_paths: Vec::new(),
            skip_extractors: Vec::new(),
            cache_exports: Vec::new(),
        }
    }
}
impl ProjectConfig {
    /// Required locales with the base locale removed; translations into the
    /// base locale are self-translations and never count towards readiness.
    pub fn target_locales(&self) -> Vec<String> {
        let mut locales: Vec<String> =
            self.required_locales.iter().filter(|l| **l != self.base_locale).cloned().collect();
        locales.sort();
        locales.dedup();
        locales
    }

    /// Compile the include/exclude globs.
    pub fn path_rules(&self) -> Result<PathRules> {
        Ok(PathRules {
            only: build_globset(&self.only_paths)?,
            skip: build_globset(&self.skip_paths)?,
        })
    }

    pub fn skips_extractor(&self, id: &str) -> bool {
        self.skip_extractors.iter().any(|s| s == id)
    }

    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        if !is_valid_locale(&self.base_locale) {
            exn::bail!(ErrorKind::Invalid(format!("projects.{name}.base_locale")));
        }
        if let Some(bad) = self.required_locales.iter().find(|l| !is_valid_locale(l)) {
            exn::bail!(ErrorKind::Invalid(format!("projects.{name}.required_locales ({bad})")));
        }
        self.path_rules().or_raise(|| ErrorKind::Invalid(format!("projects.{name}.only_paths/skip_paths")))?;
        Ok(())
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).or_raise(|| ErrorKind::Invalid(format!("glob `{pattern}`")))?);
    }
    let set = builder.build().or_raise(|| ErrorKind::Invalid("glob set".to_string()))?;
    Ok(Some(set))
}

/// Compiled include/exclude path rules for a project.
#[derive(Debug, Clone, Default)]
pub struct PathRules {
    only: Option<GlobSet>,
    skip: Option<GlobSet>,
}
impl PathRules {
    /// Returns `true` if files at `path` should be offered to extractors.
    pub fn allows(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if self.skip.as_ref().is_some_and(|skip| skip.is_match(path)) {
            return false;
        }
        self.only.as_ref().is_none_or(|only| only.is_match(path))
    }
}
