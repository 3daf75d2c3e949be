//! Storage path validation.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Normalise a storage path and make sure it stays inside the storage root.
///
/// `.` segments, repeated and trailing slashes are dropped and `..` is
/// resolved against the preceding segment. Absolute paths are treated as
/// relative to the root. Fails with
/// [`InvalidPath`](crate::error::ErrorKind::InvalidPath) for empty paths,
/// null bytes, Windows prefixes, and `..` that would leave the root.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use strand_storage::validate_path;
/// assert_eq!(
///     validate_path("exports/./abc123//json.json").unwrap(),
///     Path::new("exports/abc123/json.json")
/// );
/// assert!(validate_path("exports/../../etc/passwd").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(original.to_path_buf());
    let mut segments: Vec<&OsStr> = Vec::new();
    for component in original.components() {
        match component {
            // Null bytes survive `components()` on Unix but truncate paths in syscalls.
            Component::Normal(segment) if segment.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(segment) => segments.push(segment),
            Component::CurDir | Component::RootDir => {}
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if segments.pop().is_none() {
                    exn::bail!(invalid());
                }
            }
        }
    }
    if segments.is_empty() {
        exn::bail!(invalid());
    }
    Ok(segments.into_iter().collect())
}
