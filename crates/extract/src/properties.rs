use exn::ResultExt;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::{Extractor, Request, Unit, consts, file_name, same_locale, utf8};

/// Java `.properties` resource bundles.
///
/// `messages.properties` holds the base locale and `messages_fr.properties`
/// the `fr` translations. Comment lines directly above an entry become its
/// context.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertiesExtractor;

impl Extractor for PropertiesExtractor {
    fn id(&self) -> &'static str {
        "properties"
    }

    fn skip(&self, request: &Request<'_>) -> bool {
        let Some(captures) = consts::PROPERTIES_FILE_REGEX.captures(file_name(request.path)) else {
            return true;
        };
        match captures.name("locale") {
            Some(locale) => !same_locale(locale.as_str(), request.locale),
            None => !request.base,
        }
    }

    #[instrument(skip(self, content), fields(size = content.len()))]
    fn extract(&self, content: &[u8], request: &Request<'_>) -> Result<Vec<Unit>> {
        let text = utf8(content, request.path)?;
        parse(text).or_raise(|| ErrorKind::Malformed {
            format: "properties",
            path: request.path.to_string(),
        })
    }
}

/// A line ending in an odd number of backslashes continues on the next line.
fn continues(line: &str) -> bool {
    line.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

fn parse(text: &str) -> Result<Vec<Unit>> {
    let mut units = Vec::new();
    let mut comments: Vec<&str> = Vec::new();
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            comments.clear();
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix('#').or_else(|| trimmed.strip_prefix('!')) {
            comments.push(comment.trim());
            continue;
        }
        let mut logical = String::from(trimmed);
        while continues(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }
        let (key, value) = split_entry(&logical);
        let mut unit = Unit::new(unescape(key)?, unescape(value)?);
        if !comments.is_empty() {
            unit = unit.with_context(comments.join("\n"));
            comments.clear();
        }
        units.push(unit);
    }
    Ok(units)
}

/// Split a logical line into its raw key and raw value.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..i], line[i + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[i..].trim_start();
                let rest = rest.strip_prefix(['=', ':']).unwrap_or(rest);
                return (&line[..i], rest.trim_start());
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16).or_raise(|| ErrorKind::UnexpectedValue {
                    key: format!("\\u{hex}"),
                    path: String::new(),
                })?;
                match char::from_u32(code) {
                    Some(decoded) => out.push(decoded),
                    None => exn::bail!(ErrorKind::UnexpectedValue {
                        key: format!("\\u{hex}"),
                        path: String::new(),
                    }),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}
