use exn::{OptionExt, ResultExt};
use serde_json::Value;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::{Extractor, Request, Unit, consts, file_name, same_locale, utf8};

/// Nested JSON locale files named after their locale (`en.json`,
/// `locales/pt-BR.json`).
///
/// String leaves become units keyed by their dotted path. Numbers, booleans
/// and nulls are ignored; arrays are not supported.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor;

impl JsonExtractor {
    fn flatten(prefix: &str, value: &Value, path: &str, units: &mut Vec<Unit>) -> Result<()> {
        match value {
            Value::Object(map) => {
                for (name, child) in map {
                    let key = if prefix.is_empty() {
                        name.clone()
                    } else {
                        format!("{prefix}.{name}")
                    };
                    Self::flatten(&key, child, path, units)?;
                }
            }
            Value::String(copy) => units.push(Unit::new(prefix, copy.as_str())),
            Value::Array(_) => exn::bail!(ErrorKind::UnexpectedValue {
                key: prefix.to_string(),
                path: path.to_string(),
            }),
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
        Ok(())
    }
}

impl Extractor for JsonExtractor {
    fn id(&self) -> &'static str {
        "json"
    }

    fn skip(&self, request: &Request<'_>) -> bool {
        match consts::LOCALE_JSON_REGEX.captures(file_name(request.path)) {
            Some(captures) => !captures
                .name("locale")
                .is_some_and(|locale| same_locale(locale.as_str(), request.locale)),
            None => true,
        }
    }

    #[instrument(skip(self, content), fields(size = content.len()))]
    fn extract(&self, content: &[u8], request: &Request<'_>) -> Result<Vec<Unit>> {
        let text = utf8(content, request.path)?;
        let malformed = || ErrorKind::Malformed {
            format: "JSON",
            path: request.path.to_string(),
        };
        let root: Value = serde_json::from_str(text).or_raise(malformed)?;
        let map = root.as_object().ok_or_raise(malformed)?;
        let mut units = Vec::new();
        for (name, child) in map {
            Self::flatten(name, child, request.path, &mut units)?;
        }
        Ok(units)
    }
}
