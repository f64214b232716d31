//! Source tree enumeration: source units and existing artifacts.

pub mod filter;
pub mod walker;

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mapping;

pub use filter::{GitignoreFilter, PathFilter};
pub use walker::{scan, IncludeSet};

/// Kind of a source unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// A regular source file.
    File,
    /// A directory containing at least one matched file.
    Directory,
    /// The implicit unit standing for the whole tree.
    Root,
}

impl UnitKind {
    /// Returns `true` for directories and the root.
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(self, Self::Directory | Self::Root)
    }
}

/// A file or directory of the source tree, identified by its normalized path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Normalized path relative to the source root (`.` for the root).
    pub path: String,
    /// What kind of unit this is.
    pub kind: UnitKind,
}

impl SourceUnit {
    /// Creates a file unit.
    #[must_use]
    pub fn file(path: impl Into<String>) -> Self {
        Self { path: path.into(), kind: UnitKind::File }
    }

    /// Creates a directory unit.
    #[must_use]
    pub fn directory(path: impl Into<String>) -> Self {
        Self { path: path.into(), kind: UnitKind::Directory }
    }

    /// Creates the root unit.
    #[must_use]
    pub fn root() -> Self {
        Self { path: mapping::ROOT.to_string(), kind: UnitKind::Root }
    }

    /// Artifact path for this unit, relative to the source root.
    #[must_use]
    pub fn artifact_path(&self) -> String {
        mapping::artifact_path_of(&self.path, self.kind.is_container())
    }
}

/// Options shared by every scan of a source root.
#[derive(Clone, Default)]
pub struct CollectOptions {
    /// Include glob patterns; empty means every file.
    pub includes: Vec<String>,
    /// Ignore predicate; defaults to the root `.gitignore` plus the deny list.
    pub filter: Option<Arc<dyn PathFilter>>,
}

/// Scans `root` with the include patterns and ignore predicate of `options`.
///
/// # Errors
///
/// Returns [`ScanError`] if the root cannot be read or an include pattern is
/// invalid.
pub fn scan_with(root: &Path, options: &CollectOptions) -> Result<ScanResult, ScanError> {
    let includes = IncludeSet::new(&options.includes)?;
    let filter = options
        .filter
        .clone()
        .unwrap_or_else(|| Arc::new(GitignoreFilter::for_root(root)) as Arc<dyn PathFilter>);
    scan(root, filter, &includes)
}

/// Raw output of one traversal.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Source units in traversal order; the root comes last when present.
    pub units: Vec<SourceUnit>,
    /// Relative paths of every artifact file found.
    pub artifacts: Vec<String>,
}

impl ScanResult {
    /// Set of unit paths, for membership checks.
    #[must_use]
    pub fn unit_paths(&self) -> HashSet<&str> {
        self.units.iter().map(|u| u.path.as_str()).collect()
    }

    /// Names of the direct child units of `dir`, sorted.
    #[must_use]
    pub fn child_names(&self, dir: &str) -> BTreeSet<String> {
        child_names(&self.units, dir)
    }
}

/// Names of the units in `units` whose parent is `dir`, sorted.
#[must_use]
pub fn child_names(units: &[SourceUnit], dir: &str) -> BTreeSet<String> {
    units
        .iter()
        .filter(|u| u.kind != UnitKind::Root && mapping::parent(&u.path) == Some(dir))
        .map(|u| mapping::file_name(&u.path).to_string())
        .collect()
}

/// Fatal scan failures. Everything below the root is absorbed instead.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The source root itself cannot be read.
    #[error("cannot read source root {}: {source}", path.display())]
    RootUnreadable {
        /// The configured source root.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The source root exists but is not a directory.
    #[error("source root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    /// An include pattern failed to compile.
    #[error("invalid include pattern: {0}")]
    Pattern(#[from] globset::Error),
}
