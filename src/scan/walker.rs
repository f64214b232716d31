//! Filesystem traversal producing source units and artifact paths.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use tracing::debug;

use super::{PathFilter, ScanError, ScanResult, SourceUnit};
use crate::mapping;

/// Pattern used when no include pattern is configured.
pub const DEFAULT_INCLUDE: &str = "**/*";

/// Compiled include patterns; a file is a source unit if any pattern matches.
#[derive(Debug, Clone)]
pub struct IncludeSet {
    globs: GlobSet,
}

impl IncludeSet {
    /// Compiles the given glob patterns, falling back to [`DEFAULT_INCLUDE`].
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Pattern`] if a pattern is not a valid glob.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ScanError> {
        let mut builder = GlobSetBuilder::new();
        if patterns.is_empty() {
            builder.add(Glob::new(DEFAULT_INCLUDE)?);
        }
        for pattern in patterns {
            builder.add(Glob::new(pattern.as_ref())?);
        }
        Ok(Self { globs: builder.build()? })
    }

    /// Returns `true` if the normalized relative path matches.
    #[must_use]
    pub fn matches(&self, rel_path: &str) -> bool {
        self.globs.is_match(rel_path)
    }
}

/// Walks `base`, enumerating source units and existing artifacts in one pass.
///
/// Directories rejected by `filter` are never descended. Artifact files are
/// reported as artifacts wherever the walk reaches them. Every ancestor of a
/// matched file becomes a directory unit, and the root is appended last when
/// any unit exists.
///
/// # Errors
///
/// Returns [`ScanError`] only when `base` itself cannot be read; entries that
/// fail below the root are skipped.
pub fn scan(
    base: &Path,
    filter: Arc<dyn PathFilter>,
    includes: &IncludeSet,
) -> Result<ScanResult, ScanError> {
    let meta = std::fs::metadata(base)
        .map_err(|source| ScanError::RootUnreadable { path: base.to_path_buf(), source })?;
    if !meta.is_dir() {
        return Err(ScanError::NotADirectory(base.to_path_buf()));
    }

    let walk_root = base.to_path_buf();
    let entry_filter = Arc::clone(&filter);
    let walker = WalkBuilder::new(base)
        .standard_filters(false)
        .hidden(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                return true;
            }
            relative(&walk_root, entry.path())
                .is_some_and(|rel| entry_filter.accepts(&rel, true))
        })
        .build();

    let mut result = ScanResult::default();
    let mut seen: HashSet<String> = HashSet::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let Some(rel) = relative(base, entry.path()) else {
            continue;
        };
        if mapping::is_artifact_path(&rel) {
            result.artifacts.push(rel);
            continue;
        }
        if !filter.accepts(&rel, false) || !includes.matches(&rel) {
            continue;
        }
        push_with_ancestors(&mut result.units, &mut seen, rel);
    }

    if !result.units.is_empty() {
        result.units.push(SourceUnit::root());
    }
    debug!(
        units = result.units.len(),
        artifacts = result.artifacts.len(),
        root = %base.display(),
        "scan finished"
    );
    Ok(result)
}

/// Normalized path of `path` relative to `base`; `None` outside the base.
fn relative(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    mapping::normalize(&rel.to_string_lossy()).ok()
}

fn push_with_ancestors(units: &mut Vec<SourceUnit>, seen: &mut HashSet<String>, file: String) {
    let mut missing = Vec::new();
    let mut current = mapping::parent(&file);
    while let Some(dir) = current {
        if mapping::is_root(dir) || seen.contains(dir) {
            break;
        }
        missing.push(dir.to_string());
        current = mapping::parent(dir);
    }
    for dir in missing.into_iter().rev() {
        seen.insert(dir.clone());
        units.push(SourceUnit::directory(dir));
    }
    if seen.insert(file.clone()) {
        units.push(SourceUnit::file(file));
    }
}
