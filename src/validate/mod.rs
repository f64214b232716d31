//! Artifact validation: completeness, freshness, references, orphans.
//!
//! Each source unit is checked independently; the checks read the artifact
//! and, when the artifact records a fingerprint, the source. Per-unit checks
//! run in parallel and are merged back in unit order.

pub mod fingerprint;

use std::collections::{BTreeSet, HashSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::artifact::{ArtifactDocument, ArtifactRead, ArtifactStore, RequiredField};
use crate::mapping;
use crate::scan::{self, ScanResult, SourceUnit, UnitKind};

/// Artifact whose recorded fingerprint disagrees with its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleFile {
    /// Source unit path.
    pub path: String,
    /// Fingerprint stored in the artifact.
    pub recorded: String,
    /// Fingerprint of the source now.
    pub current: String,
}

/// Artifact lacking required fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteFile {
    /// Source unit path.
    pub path: String,
    /// Required fields that are absent or blank.
    pub missing: Vec<RequiredField>,
}

/// Artifact that exists but does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseIssue {
    /// Source unit path.
    pub path: String,
    /// Parser diagnostic.
    pub message: String,
}

/// A `references` entry that resolves to no source unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleReference {
    /// Source unit whose artifact holds the reference.
    pub path: String,
    /// The reference as written.
    pub reference: String,
}

/// Directory artifact whose `contents` disagrees with the actual children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentsIssue {
    /// Directory unit path.
    pub path: String,
    /// Children present on disk but not listed.
    pub missing: Vec<String>,
    /// Listed names that are not children.
    pub unexpected: Vec<String>,
}

/// Per-unit verdict. `documented` and `complete` are tracked separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStatus {
    /// The unit checked.
    pub unit: SourceUnit,
    /// Artifact exists and parses.
    pub documented: bool,
    /// Artifact carries every required field.
    pub complete: bool,
    /// Artifact fingerprint disagrees with the source.
    pub stale: bool,
}

/// Everything the validator found in one pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// One status per unit, in scan order.
    pub statuses: Vec<UnitStatus>,
    /// Stale artifacts.
    pub stale_files: Vec<StaleFile>,
    /// Incomplete artifacts.
    pub incomplete_files: Vec<IncompleteFile>,
    /// Unparsable artifacts.
    pub parse_errors: Vec<ParseIssue>,
    /// Dangling cross references.
    pub stale_references: Vec<StaleReference>,
    /// Directory listings out of step with the tree.
    pub contents_issues: Vec<ContentsIssue>,
    /// Artifact paths with no matching source unit.
    pub orphaned_artifacts: Vec<String>,
}

#[derive(Debug, Default)]
struct UnitFindings {
    stale: Option<StaleFile>,
    incomplete: Option<IncompleteFile>,
    parse_error: Option<ParseIssue>,
    references: Vec<StaleReference>,
    contents: Option<ContentsIssue>,
}

/// Validates every unit of `scan` against its artifact.
///
/// Never fails: unreadable artifacts are undocumented, unreadable sources are
/// treated as fresh.
#[must_use]
pub fn validate(store: &ArtifactStore<'_>, scan: &ScanResult) -> ValidationReport {
    let unit_paths = scan.unit_paths();

    let checked: Vec<(UnitStatus, UnitFindings)> =
        scan.units.par_iter().map(|unit| check_unit(store, scan, &unit_paths, unit)).collect();

    let mut report = ValidationReport::default();
    for (status, findings) in checked {
        report.stale_files.extend(findings.stale);
        report.incomplete_files.extend(findings.incomplete);
        report.parse_errors.extend(findings.parse_error);
        report.stale_references.extend(findings.references);
        report.contents_issues.extend(findings.contents);
        report.statuses.push(status);
    }
    report.orphaned_artifacts = find_orphans(&scan.artifacts, &scan.units);
    report
}

/// Artifact paths that are not the artifact of any unit in `units`.
///
/// A stray `src.au` next to the directory `src` is an orphan, as is
/// `Makefile/.au` for the file `Makefile`.
#[must_use]
pub fn find_orphans(artifacts: &[String], units: &[SourceUnit]) -> Vec<String> {
    let expected: HashSet<String> = units.iter().map(SourceUnit::artifact_path).collect();
    artifacts.iter().filter(|artifact| !expected.contains(*artifact)).cloned().collect()
}

fn check_unit(
    store: &ArtifactStore<'_>,
    scan: &ScanResult,
    unit_paths: &HashSet<&str>,
    unit: &SourceUnit,
) -> (UnitStatus, UnitFindings) {
    let mut status =
        UnitStatus { unit: unit.clone(), documented: false, complete: false, stale: false };
    let mut findings = UnitFindings::default();

    let doc = match store.read(unit) {
        ArtifactRead::Missing => return (status, findings),
        ArtifactRead::Unparsable(message) => {
            findings.parse_error = Some(ParseIssue { path: unit.path.clone(), message });
            return (status, findings);
        }
        ArtifactRead::Parsed(doc) => doc,
    };
    status.documented = true;

    let missing = doc.missing_fields(unit.kind, &unit.path);
    status.complete = missing.is_empty();
    if !missing.is_empty() {
        findings.incomplete = Some(IncompleteFile { path: unit.path.clone(), missing });
    }

    let children =
        if unit.kind.is_container() { scan.child_names(&unit.path) } else { BTreeSet::new() };

    findings.stale = check_freshness(store, unit, &doc, &children);
    status.stale = findings.stale.is_some();

    findings.references = dangling_references(&unit.path, &doc, unit_paths);
    if unit.kind.is_container() {
        findings.contents = check_contents(&unit.path, &doc, &children);
    }
    (status, findings)
}

fn check_freshness(
    store: &ArtifactStore<'_>,
    unit: &SourceUnit,
    doc: &ArtifactDocument,
    children: &BTreeSet<String>,
) -> Option<StaleFile> {
    let recorded = doc.source_hash()?;
    let current = match unit.kind {
        UnitKind::File => fingerprint::file_fingerprint(store, &unit.path)?,
        UnitKind::Directory | UnitKind::Root => fingerprint::directory_fingerprint(children),
    };
    (recorded != current).then(|| StaleFile {
        path: unit.path.clone(),
        recorded: recorded.to_string(),
        current,
    })
}

/// Current fingerprint of `unit` among `units`, used when stamping a freshly
/// written artifact.
#[must_use]
pub fn current_fingerprint(
    store: &ArtifactStore<'_>,
    units: &[SourceUnit],
    unit: &SourceUnit,
) -> Option<String> {
    match unit.kind {
        UnitKind::File => fingerprint::file_fingerprint(store, &unit.path),
        UnitKind::Directory | UnitKind::Root => {
            Some(fingerprint::directory_fingerprint(&scan::child_names(units, &unit.path)))
        }
    }
}

fn dangling_references(
    owner: &str,
    doc: &ArtifactDocument,
    unit_paths: &HashSet<&str>,
) -> Vec<StaleReference> {
    doc.references
        .iter()
        .filter(|reference| {
            mapping::normalize(reference)
                .map(|normalized| !unit_paths.contains(mapping::to_source_path(&normalized).as_str()))
                .unwrap_or(true)
        })
        .map(|reference| StaleReference { path: owner.to_string(), reference: reference.clone() })
        .collect()
}

fn check_contents(
    path: &str,
    doc: &ArtifactDocument,
    children: &BTreeSet<String>,
) -> Option<ContentsIssue> {
    let listed: BTreeSet<String> = doc
        .contents
        .as_ref()?
        .iter()
        .map(|name| name.trim().trim_start_matches("./").trim_end_matches('/').to_string())
        .filter(|name| !name.is_empty())
        .collect();
    let missing: Vec<String> = children.difference(&listed).cloned().collect();
    let unexpected: Vec<String> = listed.difference(children).cloned().collect();
    if missing.is_empty() && unexpected.is_empty() {
        return None;
    }
    Some(ContentsIssue { path: path.to_string(), missing, unexpected })
}
