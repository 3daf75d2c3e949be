//! Exporters turn the translations of a commit into downloadable artifacts.
//!
//! Each exporter has a stable id and a deterministic output path per
//! revision, so cached artifacts can be found, invalidated and regenerated
//! without any extra bookkeeping.

pub mod error;
mod json;
mod ndjson;

use std::io::Write;
use std::sync::Arc;

use crate::error::Result;
pub use crate::json::JsonExporter;
pub use crate::ndjson::NdjsonExporter;

/// One translated string of a commit.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Entry {
    pub key: String,
    pub locale: String,
    pub copy: String,
}
impl From<(String, String, String)> for Entry {
    fn from((key, locale, copy): (String, String, String)) -> Self {
        Self { key, locale, copy }
    }
}

pub trait Exporter: std::fmt::Debug + Send + Sync {
    /// Stable identifier, unique among registered exporters.
    fn id(&self) -> &'static str;

    fn extension(&self) -> &'static str;

    /// Storage path of this exporter's artifact for a revision.
    fn output_path(&self, revision: &str) -> String {
        format!("exports/{revision}/{}.{}", self.id(), self.extension())
    }

    /// Write the artifact for `entries`. Output depends only on the set of
    /// entries, not their order.
    fn export(&self, entries: &[Entry], w: &mut dyn Write) -> Result<()>;

    fn export_to_vec(&self, entries: &[Entry]) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.export(entries, &mut buffer)?;
        Ok(buffer)
    }
}

pub type ExporterHandle = Arc<dyn Exporter>;

/// Every bundled exporter.
pub fn builtin() -> Vec<ExporterHandle> {
    vec![Arc::new(JsonExporter), Arc::new(NdjsonExporter)]
}
