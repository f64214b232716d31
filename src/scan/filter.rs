//! Ignore predicate consulted before the scanner reports or descends into a path.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::warn;

use crate::mapping;

/// Directory names that are never part of the source tree.
pub const DENY_LIST: &[&str] = &[".git", ".hg", ".svn", ".mirrordoc"];

/// Decides whether a path belongs to the source tree.
pub trait PathFilter: Send + Sync {
    /// Returns `true` if `rel_path` (normalized, relative to the root) is accepted.
    fn accepts(&self, rel_path: &str, is_dir: bool) -> bool;
}

/// Filter combining the root `.gitignore` with [`DENY_LIST`], artifact
/// files, and any paths the tool itself owns.
pub struct GitignoreFilter {
    matcher: Gitignore,
    excluded: Vec<String>,
}

impl GitignoreFilter {
    /// Builds a filter from `<root>/.gitignore` when present.
    ///
    /// An unreadable or malformed ignore file degrades to the deny list alone.
    #[must_use]
    pub fn for_root(root: &Path) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        let ignore_file = root.join(".gitignore");
        if ignore_file.is_file() {
            if let Some(err) = builder.add(&ignore_file) {
                warn!(path = %ignore_file.display(), error = %err, "ignoring unreadable .gitignore");
            }
        }
        let matcher = builder.build().unwrap_or_else(|err| {
            warn!(error = %err, "invalid .gitignore rules, falling back to deny list");
            Gitignore::empty()
        });
        Self { matcher, excluded: Vec::new() }
    }

    /// Filter with only the built-in deny rules.
    #[must_use]
    pub fn deny_list_only() -> Self {
        Self { matcher: Gitignore::empty(), excluded: Vec::new() }
    }

    /// Also rejects each of `paths`, relative to the root, and everything
    /// under it. Paths that are invalid or name the root are skipped.
    #[must_use]
    pub fn excluding<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded.extend(
            paths
                .into_iter()
                .filter_map(|raw| mapping::normalize(raw.as_ref()).ok())
                .filter(|path| !mapping::is_root(path)),
        );
        self
    }

    fn is_excluded(&self, rel_path: &str) -> bool {
        self.excluded.iter().any(|owned| {
            rel_path
                .strip_prefix(owned.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

impl PathFilter for GitignoreFilter {
    fn accepts(&self, rel_path: &str, is_dir: bool) -> bool {
        if mapping::is_root(rel_path) {
            return true;
        }
        if rel_path.split('/').any(|segment| DENY_LIST.contains(&segment)) {
            return false;
        }
        if self.is_excluded(rel_path) {
            return false;
        }
        if !is_dir && mapping::is_artifact_path(rel_path) {
            return false;
        }
        !self.matcher.matched_path_or_any_parents(rel_path, is_dir).is_ignore()
    }
}
