//! Live progress view seeded from a coverage snapshot.
//!
//! The tracker answers "what is left" between worker turns without touching
//! the filesystem. It only ever learns about success through
//! [`ProgressTracker::apply`] / [`ProgressTracker::mark_documented`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::coverage::{percent, CoverageSnapshot};

/// Emitted by the worker after it successfully writes or removes an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerEvent {
    /// Source unit whose artifact was written, or the artifact path of a
    /// removed orphan.
    pub unit_path: String,
    /// The artifact did not exist before the write.
    pub is_new: bool,
    /// Artifact size change in bytes.
    pub byte_delta: i64,
}

/// Counts reported by [`ProgressTracker::counts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressCounts {
    /// Known units.
    pub total: usize,
    /// Known units marked documented.
    pub documented: usize,
    /// Known units not yet documented.
    pub pending: usize,
}

/// Mutable progress state owned by one run.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    order: Vec<String>,
    all_items: HashSet<String>,
    documented: HashSet<String>,
    open_issues: HashSet<String>,
    orphans: Vec<String>,
    open_orphans: HashSet<String>,
    bytes_written: i64,
}

impl ProgressTracker {
    /// Creates a tracker seeded from `snapshot`.
    #[must_use]
    pub fn from_snapshot(snapshot: &CoverageSnapshot) -> Self {
        let mut tracker = Self::default();
        tracker.init(snapshot);
        tracker
    }

    /// Discards all state and reseeds from `snapshot`.
    pub fn init(&mut self, snapshot: &CoverageSnapshot) {
        self.order = snapshot.items.iter().map(|u| u.path.clone()).collect();
        self.all_items = self.order.iter().cloned().collect();
        self.documented = snapshot.documented_paths.iter().cloned().collect();
        self.open_issues = snapshot
            .stale_files
            .iter()
            .map(|s| s.path.clone())
            .chain(snapshot.incomplete_files.iter().map(|i| i.path.clone()))
            .chain(snapshot.stale_references.iter().map(|r| r.path.clone()))
            .chain(snapshot.contents_issues.iter().map(|c| c.path.clone()))
            .collect();
        self.orphans = snapshot.orphaned_artifacts.clone();
        self.open_orphans = self.orphans.iter().cloned().collect();
        self.bytes_written = 0;
    }

    /// Marks `path` documented. Unknown paths are ignored.
    ///
    /// Returns `true` if the documented count changed.
    pub fn mark_documented(&mut self, path: &str) -> bool {
        if !self.all_items.contains(path) {
            return false;
        }
        self.documented.insert(path.to_string())
    }

    /// Applies a worker success event: marks the unit documented and closes
    /// any issue its artifact had, or the orphan it removed.
    pub fn apply(&mut self, event: &WorkerEvent) {
        self.mark_documented(&event.unit_path);
        self.open_issues.remove(&event.unit_path);
        self.open_orphans.remove(&event.unit_path);
        self.bytes_written += event.byte_delta;
    }

    /// Up to `limit` undocumented units, in snapshot order.
    #[must_use]
    pub fn pending_items(&self, limit: usize) -> Vec<&str> {
        self.order
            .iter()
            .filter(|path| !self.documented.contains(*path))
            .take(limit)
            .map(String::as_str)
            .collect()
    }

    /// Units whose artifact still has an open stale, incomplete, reference,
    /// or contents issue, in snapshot order.
    #[must_use]
    pub fn open_issues(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|p| self.open_issues.contains(*p))
            .map(String::as_str)
            .collect()
    }

    /// Orphaned artifacts not yet removed, in snapshot order.
    #[must_use]
    pub fn open_orphans(&self) -> Vec<&str> {
        self.orphans
            .iter()
            .filter(|a| self.open_orphans.contains(*a))
            .map(String::as_str)
            .collect()
    }

    /// `true` once nothing is pending and every open issue and orphan has
    /// been handled.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.counts().pending == 0 && self.open_issues.is_empty() && self.open_orphans.is_empty()
    }

    /// Current counts.
    #[must_use]
    pub fn counts(&self) -> ProgressCounts {
        let total = self.all_items.len();
        let documented = self.all_items.intersection(&self.documented).count();
        ProgressCounts { total, documented, pending: total - documented }
    }

    /// Rounded documented share in percent; 100 when nothing is tracked.
    #[must_use]
    pub fn progress_percent(&self) -> u32 {
        let counts = self.counts();
        percent(counts.documented, counts.total)
    }

    /// Net bytes written by applied events since the last `init`.
    #[must_use]
    pub fn bytes_written(&self) -> i64 {
        self.bytes_written
    }
}
