//! Extractors find translatable strings in the blobs of a source snapshot.
//!
//! An extractor is identified by a stable id (used by the per-blob
//! "already extracted" marker and by project `skip_extractors` rules) and is
//! asked two things about every blob found under an allowed path: whether it
//! declines the work, and if not, which units the blob contains.

mod consts;
pub mod error;
mod json;
mod properties;

use std::sync::Arc;

use crate::error::Result;
pub use crate::json::JsonExtractor;
pub use crate::properties::PropertiesExtractor;

/// A translatable string found in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Unit {
    pub key: String,
    /// Copy in the locale that was extracted.
    pub copy: String,
    /// Free-form hint for translators.
    pub context: Option<String>,
}
impl Unit {
    pub fn new(key: impl Into<String>, copy: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            copy: copy.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// What is being extracted, and for which locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    /// Slash-separated path of the blob within the snapshot.
    pub path: &'a str,
    pub revision: &'a str,
    /// The project's base locale for a regular import, or the locale being
    /// imported.
    pub locale: &'a str,
    /// `locale` is the project's base locale.
    pub base: bool,
}

pub trait Extractor: std::fmt::Debug + Send + Sync {
    /// Stable identifier, unique among registered extractors.
    fn id(&self) -> &'static str;

    /// Returns `true` if this extractor has nothing to do for the blob.
    fn skip(&self, request: &Request<'_>) -> bool;

    fn extract(&self, content: &[u8], request: &Request<'_>) -> Result<Vec<Unit>>;
}

pub type ExtractorHandle = Arc<dyn Extractor>;

/// Every bundled extractor.
pub fn builtin() -> Vec<ExtractorHandle> {
    vec![Arc::new(JsonExtractor), Arc::new(PropertiesExtractor)]
}

/// Compare locale tags ignoring case and `-`/`_` separators.
pub(crate) fn same_locale(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes().zip(b.bytes()).all(|(x, y)| match (x, y) {
            (b'-' | b'_', b'-' | b'_') => true,
            _ => x.eq_ignore_ascii_case(&y),
        })
}

/// Final path segment.
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub(crate) fn utf8<'a>(content: &'a [u8], path: &str) -> Result<&'a str> {
    use exn::ResultExt;
    std::str::from_utf8(content).or_raise(|| error::ErrorKind::Encoding(path.to_string()))
}
