use regex::Regex;
use std::sync::LazyLock;

static LOCALE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z0-9]{1,8})*$").unwrap());

/// Returns `true` if `locale` looks like an RFC 5646 language tag
/// (`en`, `fr-CA`, `zh-Hant-TW`).
///
/// This is a syntactic check only; no registry lookup is performed.
pub fn is_valid_locale(locale: &str) -> bool {
    LOCALE_REGEX.is_match(locale)
}
