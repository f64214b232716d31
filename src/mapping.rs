//! Bidirectional mapping between source units and their artifact paths.
//!
//! Layout, relative to the source root:
//!
//! ```text
//! .               -> .au
//! src/main.ts     -> src/main.ts.au
//! src/lib         -> src/lib/.au
//! ```
//!
//! When the kind of a unit is known, [`artifact_path_of`] maps it exactly.
//! For bare path strings a path carrying an extension is treated as a file
//! and a path without one as a directory. Both directions accept their own
//! output and the other side's input idempotently, so
//! `to_source_path(to_artifact_path(p))` is `p` for every normalized source
//! path.

use thiserror::Error;

/// Suffix appended to file paths to form their artifact path.
pub const ARTIFACT_SUFFIX: &str = ".au";

/// File name of a directory artifact, nested inside the directory.
pub const DIR_ARTIFACT_NAME: &str = ".au";

/// Path of the root unit.
pub const ROOT: &str = ".";

/// Structural errors raised while normalizing a raw path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path is absolute; unit paths are always relative to the root.
    #[error("path must be relative to the source root: {0}")]
    Absolute(String),
    /// The path climbs above the source root.
    #[error("path escapes the source root: {0}")]
    Escapes(String),
}

/// Normalizes a raw relative path into unit identity form.
///
/// Backslashes become `/`, `.` segments and empty segments are dropped, and
/// an empty result is the root `.`.
///
/// # Errors
///
/// Returns [`PathError`] for absolute paths and paths containing `..`.
pub fn normalize(raw: &str) -> Result<String, PathError> {
    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(PathError::Absolute(raw.to_string()));
    }
    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(PathError::Escapes(raw.to_string())),
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        Ok(ROOT.to_string())
    } else {
        Ok(segments.join("/"))
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Returns `true` for the root unit path (`.` or empty).
#[must_use]
pub fn is_root(path: &str) -> bool {
    path.is_empty() || path == ROOT
}

/// Returns `true` if `path` names an artifact rather than a source unit.
#[must_use]
pub fn is_artifact_path(path: &str) -> bool {
    path.ends_with(ARTIFACT_SUFFIX)
}

/// Returns `true` if the final segment of `path` carries an extension.
#[must_use]
pub fn has_extension(path: &str) -> bool {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => false,
        Some(idx) => idx + 1 < name.len(),
    }
}

/// Maps a normalized source path to its artifact path.
///
/// The kind is guessed from the extension; use [`artifact_path_of`] when it
/// is known.
#[must_use]
pub fn to_artifact_path(source: &str) -> String {
    if !is_root(source) && is_artifact_path(source) {
        return source.to_string();
    }
    artifact_path_of(source, !has_extension(source))
}

/// Maps a source path of known kind to its artifact path.
///
/// Extensionless files such as `Makefile` map to `Makefile.au`.
#[must_use]
pub fn artifact_path_of(source: &str, is_dir: bool) -> String {
    if is_root(source) {
        DIR_ARTIFACT_NAME.to_string()
    } else if is_dir {
        format!("{source}/{DIR_ARTIFACT_NAME}")
    } else {
        format!("{source}{ARTIFACT_SUFFIX}")
    }
}

/// Maps an artifact path back to the source path it describes.
///
/// Paths that are not artifact paths are returned unchanged.
#[must_use]
pub fn to_source_path(artifact: &str) -> String {
    if artifact == DIR_ARTIFACT_NAME {
        return ROOT.to_string();
    }
    if let Some(dir) = artifact.strip_suffix(&format!("/{DIR_ARTIFACT_NAME}")) {
        return dir.to_string();
    }
    match artifact.strip_suffix(ARTIFACT_SUFFIX) {
        Some(file) => file.to_string(),
        None => artifact.to_string(),
    }
}

/// Parent unit of a normalized path; the root has no parent.
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    if is_root(path) {
        return None;
    }
    Some(path.rsplit_once('/').map_or(ROOT, |(dir, _)| dir))
}

/// Final segment of a normalized path.
#[must_use]
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
