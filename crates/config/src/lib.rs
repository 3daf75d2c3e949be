//! Layered configuration for strand.
//!
//! Values are merged from (lowest to highest precedence):
//! 1. Built-in defaults,
//! 2. A TOML file (explicit path, or `strand.toml` in the platform config
//!    directory),
//! 3. Environment variables prefixed with `STRAND_`, nested keys separated by
//!    a double underscore (`STRAND_WORKERS__CONCURRENCY=4`).

pub mod error;
mod locale;
mod project;

pub use crate::locale::is_valid_locale;
pub use crate::project::{PathRules, ProjectConfig};
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::instrument;

const ENV_PREFIX: &str = "STRAND_";
const CONFIG_FILE: &str = "strand.toml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite cache database.
    pub database: PathBuf,
    /// Root directory for cached export artifacts.
    pub artifacts: PathBuf,
    pub workers: Workers,
    /// Projects keyed by their unique name.
    pub projects: BTreeMap<String, ProjectConfig>,
}

/// Background worker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Workers {
    /// Maximum number of extraction units running at the same time.
    pub concurrency: usize,
}
impl Default for Workers {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

impl Default for Config {
    fn default() -> Self {
        let dirs = ProjectDirs::from("", "", "strand");
        let database = match &dirs {
            Some(dirs) => dirs.data_dir().join("strand.db"),
            None => PathBuf::from("strand.db"),
        };
        let artifacts = match &dirs {
            Some(dirs) => dirs.cache_dir().join("artifacts"),
            None => PathBuf::from("artifacts"),
        };
        Self {
            database,
            artifacts,
            workers: Workers::default(),
            projects: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration, optionally from an explicit file.
    ///
    /// A missing explicit file is not an error (figment treats absent files as
    /// empty providers); validation runs after merging.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = &path {
            tracing::debug!(path = %path.display(), "merging configuration file");
            figment = figment.merge(Toml::file(path));
        }
        let config: Config =
            figment.merge(Env::prefixed(ENV_PREFIX).split("__")).extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// `strand.toml` inside the platform configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "strand").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.projects.get(name)
    }

    /// Check values that deserialized fine but make no sense.
    pub fn validate(&self) -> Result<()> {
        if self.workers.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("workers.concurrency".to_string()));
        }
        for (name, project) in &self.projects {
            if name.trim().is_empty() {
                exn::bail!(ErrorKind::Invalid("projects (empty name)".to_string()));
            }
            project.validate(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn load_in_jail(path: &str) -> figment::error::Result<Config> {
        Config::load(Some(Path::new(path))).map_err(|e| figment::Error::from(e.to_string()))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workers.concurrency, 8);
        assert!(config.projects.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "strand.toml",
                r#"
                    database = "cache.db"

                    [projects.web]
                    base_locale = "en"
                    required_locales = ["fr", "de"]
                    skip_paths = ["vendor/**"]
                    cache_exports = ["json"]
                "#,
            )?;
            let config = load_in_jail("strand.toml")?;
            assert_eq!(config.database, PathBuf::from("cache.db"));
            let web = config.project("web").unwrap();
            assert_eq!(web.required_locales, vec!["fr".to_string(), "de".to_string()]);
            assert_eq!(web.cache_exports, vec!["json".to_string()]);
            assert!(web.only_paths.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("strand.toml", "[workers]\nconcurrency = 2\n")?;
            jail.set_env("STRAND_WORKERS__CONCURRENCY", "5");
            let config = load_in_jail("strand.toml")?;
            assert_eq!(config.workers.concurrency, 5);
            Ok(())
        });
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("strand.toml", "[workers]\nconcurrency = 0\n")?;
            assert!(load_in_jail("strand.toml").is_err());
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = load_in_jail("does-not-exist.toml")?;
            assert_eq!(config.workers, Workers::default());
            Ok(())
        });
    }
}
