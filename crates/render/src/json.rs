use std::collections::BTreeMap;
use std::io::Write;

use exn::ResultExt;

use crate::error::{ErrorKind, Result};
use crate::{Entry, Exporter};

/// One pretty-printed document, `{"<locale>": {"<key>": "<copy>"}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn id(&self) -> &'static str {
        "json"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn export(&self, entries: &[Entry], w: &mut dyn Write) -> Result<()> {
        let mut locales: BTreeMap<&str, BTreeMap<&str, &str>> = BTreeMap::new();
        for entry in entries {
            locales
                .entry(entry.locale.as_str())
                .or_default()
                .insert(entry.key.as_str(), entry.copy.as_str());
        }
        serde_json::to_writer_pretty(&mut *w, &locales).or_raise(|| ErrorKind::Serialize("json"))?;
        w.write_all(b"\n").or_raise(|| ErrorKind::Io)
    }
}
