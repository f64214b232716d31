//! Coverage aggregation: one immutable snapshot per scan.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::artifact::ArtifactStore;
use crate::context::ServiceContext;
use crate::scan::{self, ScanError, SourceUnit};
use crate::validate::{
    self, ContentsIssue, IncompleteFile, ParseIssue, StaleFile, StaleReference,
};

pub use crate::scan::CollectOptions;

/// Result of one scan-and-validate pass. Superseded, never mutated.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoverageSnapshot {
    /// Number of source units, root included.
    pub total_items: usize,
    /// Units whose artifact exists and parses.
    pub documented_items: usize,
    /// Every unit in scan order.
    pub items: Vec<SourceUnit>,
    /// Paths of documented units, in scan order.
    pub documented_paths: Vec<String>,
    /// Units without a usable artifact, in scan order.
    pub pending_items: Vec<SourceUnit>,
    /// Artifacts whose fingerprint no longer matches.
    pub stale_files: Vec<StaleFile>,
    /// Artifacts missing required fields.
    pub incomplete_files: Vec<IncompleteFile>,
    /// Artifacts that fail to parse.
    pub parse_errors: Vec<ParseIssue>,
    /// Dangling cross references.
    pub stale_references: Vec<StaleReference>,
    /// Directory listings out of step with the tree.
    pub contents_issues: Vec<ContentsIssue>,
    /// Artifacts with no source unit.
    pub orphaned_artifacts: Vec<String>,
}

impl CoverageSnapshot {
    /// `true` if anything is pending or any issue bucket is non-empty.
    #[must_use]
    pub fn has_work(&self) -> bool {
        !self.pending_items.is_empty() || self.issue_count() > 0
    }

    /// Total entries across all issue buckets.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.stale_files.len()
            + self.incomplete_files.len()
            + self.parse_errors.len()
            + self.stale_references.len()
            + self.contents_issues.len()
            + self.orphaned_artifacts.len()
    }

    /// Rounded documented share in percent; 100 for an empty tree.
    #[must_use]
    pub fn coverage_percent(&self) -> u32 {
        percent(self.documented_items, self.total_items)
    }
}

/// Rounded `part / total` in percent, 100 when `total` is zero.
#[must_use]
pub fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = (part as f64 / total as f64 * 100.0).round() as u32;
    value
}

/// Scans `base`, validates every unit, and builds a snapshot.
///
/// # Errors
///
/// Returns [`ScanError`] if the source root cannot be read or an include
/// pattern is invalid. Problems below the root become issues instead.
pub fn collect(
    ctx: &ServiceContext,
    base: &Path,
    options: &CollectOptions,
) -> Result<CoverageSnapshot, ScanError> {
    let scanned = scan::scan_with(base, options)?;
    let store = ArtifactStore::new(ctx, base);
    let snapshot = build(&store, &scanned);
    info!(
        total = snapshot.total_items,
        documented = snapshot.documented_items,
        issues = snapshot.issue_count(),
        "coverage collected"
    );
    Ok(snapshot)
}

/// Builds a snapshot from an existing scan.
#[must_use]
pub fn build(store: &ArtifactStore<'_>, scanned: &scan::ScanResult) -> CoverageSnapshot {
    let report = validate::validate(store, scanned);

    let mut snapshot = CoverageSnapshot {
        total_items: scanned.units.len(),
        items: scanned.units.clone(),
        stale_files: report.stale_files,
        incomplete_files: report.incomplete_files,
        parse_errors: report.parse_errors,
        stale_references: report.stale_references,
        contents_issues: report.contents_issues,
        orphaned_artifacts: report.orphaned_artifacts,
        ..CoverageSnapshot::default()
    };
    for status in report.statuses {
        if status.documented {
            snapshot.documented_paths.push(status.unit.path);
        } else {
            snapshot.pending_items.push(status.unit);
        }
    }
    snapshot.documented_items = snapshot.documented_paths.len();
    debug!(pending = snapshot.pending_items.len(), "snapshot built");
    snapshot
}

/// Renders a snapshot as a human-readable report.
#[must_use]
pub fn format_report(snapshot: &CoverageSnapshot) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Coverage: {}/{} units documented ({}%)",
        snapshot.documented_items,
        snapshot.total_items,
        snapshot.coverage_percent()
    ));

    if !snapshot.pending_items.is_empty() {
        lines.push(format!("Pending ({}):", snapshot.pending_items.len()));
        for unit in &snapshot.pending_items {
            lines.push(format!("  [PENDING] {}", unit.path));
        }
    }
    lines.extend(issue_lines(snapshot).into_iter().map(|line| format!("  {line}")));

    lines.push(String::new());
    if snapshot.has_work() {
        lines.push(format!(
            "{} pending, {} issue{}.",
            snapshot.pending_items.len(),
            snapshot.issue_count(),
            if snapshot.issue_count() == 1 { "" } else { "s" }
        ));
    } else {
        lines.push("Nothing to do.".to_string());
    }
    lines.join("\n")
}

/// One tagged line per issue, bucket by bucket.
#[must_use]
pub fn issue_lines(snapshot: &CoverageSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    for issue in &snapshot.parse_errors {
        lines.push(format!("[PARSE] {}: {}", issue.path, issue.message));
    }
    for issue in &snapshot.incomplete_files {
        let fields: Vec<&str> = issue.missing.iter().map(|f| f.as_str()).collect();
        lines.push(format!("[INCOMPLETE] {} (missing: {})", issue.path, fields.join(", ")));
    }
    for issue in &snapshot.stale_files {
        lines.push(format!("[STALE] {}", issue.path));
    }
    for issue in &snapshot.stale_references {
        lines.push(format!("[REFERENCE] {} -> {}", issue.path, issue.reference));
    }
    for issue in &snapshot.contents_issues {
        let mut detail = Vec::new();
        if !issue.missing.is_empty() {
            detail.push(format!("unlisted: {}", issue.missing.join(", ")));
        }
        if !issue.unexpected.is_empty() {
            detail.push(format!("not present: {}", issue.unexpected.join(", ")));
        }
        lines.push(format!("[CONTENTS] {} ({})", issue.path, detail.join("; ")));
    }
    for orphan in &snapshot.orphaned_artifacts {
        lines.push(format!("[ORPHAN] {orphan}"));
    }
    lines
}
