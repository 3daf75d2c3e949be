use std::io::Write;

use exn::ResultExt;

use crate::error::{ErrorKind, Result};
use crate::{Entry, Exporter};

/// One `{"key", "locale", "copy"}` object per line, sorted by key then locale.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdjsonExporter;

impl Exporter for NdjsonExporter {
    fn id(&self) -> &'static str {
        "ndjson"
    }

    fn extension(&self) -> &'static str {
        "ndjson"
    }

    fn export(&self, entries: &[Entry], w: &mut dyn Write) -> Result<()> {
        let mut sorted: Vec<&Entry> = entries.iter().collect();
        sorted.sort_by(|a, b| (&a.key, &a.locale).cmp(&(&b.key, &b.locale)));
        for entry in sorted {
            serde_json::to_writer(&mut *w, entry).or_raise(|| ErrorKind::Serialize("ndjson"))?;
            w.write_all(b"\n").or_raise(|| ErrorKind::Io)?;
        }
        Ok(())
    }
}
