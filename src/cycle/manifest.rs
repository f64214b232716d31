//! Phase manifest: which source files each phase of a pipeline covers.
//!
//! ```text
//! phases:
//!   1:
//!     files: [src/index.ts]
//!     patterns: ["src/api/**"]
//! stats:
//!   total_files: 12
//!   assigned_files: 7
//!   coverage_ratio: 0.58
//!   phase_counts: {1: 7}
//! outputs:
//!   1: [src/api/handler.ts.au, src/index.ts.au]
//! ```
//!
//! The manifest is authored by hand or by an earlier phase. `stats` and
//! `outputs` are recomputed by [`Manifest::sync_outputs`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::state::{write_atomic, StateError};
use crate::artifact::ArtifactStore;
use crate::context::ServiceContext;
use crate::scan::{SourceUnit, UnitKind};

/// File name of the manifest inside the state directory.
pub const MANIFEST_FILE: &str = "manifest.yaml";

/// Files and glob patterns assigned to one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseAssignment {
    /// Explicit source paths.
    #[serde(default)]
    pub files: Vec<String>,
    /// Glob patterns matched against source file paths.
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Declared assignment statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestStats {
    /// Source files in the tree.
    #[serde(default)]
    pub total_files: usize,
    /// Distinct source files assigned to at least one phase.
    #[serde(default)]
    pub assigned_files: usize,
    /// `assigned_files / total_files`.
    #[serde(default)]
    pub coverage_ratio: f64,
    /// Files per phase.
    #[serde(default)]
    pub phase_counts: BTreeMap<u32, usize>,
}

/// Manifest failures.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A phase pattern is not a valid glob.
    #[error("invalid pattern in phase {phase}: {source}")]
    Pattern {
        /// Phase holding the pattern.
        phase: u32,
        /// Glob compilation error.
        #[source]
        source: globset::Error,
    },
    /// Writing the manifest failed.
    #[error(transparent)]
    Store(#[from] StateError),
}

/// Phase assignment document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Assignments keyed by phase number.
    #[serde(default)]
    pub phases: BTreeMap<u32, PhaseAssignment>,
    /// Assignment statistics.
    #[serde(default)]
    pub stats: ManifestStats,
    /// Artifact paths produced per phase.
    #[serde(default)]
    pub outputs: BTreeMap<u32, Vec<String>>,
}

impl Manifest {
    /// Location of the manifest for a state directory.
    #[must_use]
    pub fn path_in(state_dir: &Path) -> std::path::PathBuf {
        state_dir.join(MANIFEST_FILE)
    }

    /// Loads the manifest at `path`.
    ///
    /// Returns `None` when the file is absent, unreadable, or corrupt.
    #[must_use]
    pub fn load(ctx: &ServiceContext, path: &Path) -> Option<Self> {
        if !ctx.fs.exists(path) {
            return None;
        }
        let text = match ctx.fs.read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable manifest ignored");
                return None;
            }
        };
        match serde_yaml::from_str(&text) {
            Ok(manifest) => Some(manifest),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "corrupt manifest ignored");
                None
            }
        }
    }

    /// Writes the manifest to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Store`] if serialization or the write fails.
    pub fn save(&self, ctx: &ServiceContext, path: &Path) -> Result<(), ManifestError> {
        let yaml = serde_yaml::to_string(self).map_err(StateError::from)?;
        write_atomic(ctx, path, &yaml)?;
        Ok(())
    }

    /// Explicit file list of `phase` when it declares no patterns.
    ///
    /// Callers can use this list directly instead of scanning the tree.
    #[must_use]
    pub fn declared_files(&self, phase: u32) -> Option<&[String]> {
        let assignment = self.phases.get(&phase)?;
        assignment.patterns.is_empty().then_some(assignment.files.as_slice())
    }

    /// File units among `units` assigned to `phase`, in `units` order.
    ///
    /// Returns `Ok(None)` when the manifest does not know `phase`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Pattern`] if a pattern of `phase` is invalid.
    pub fn phase_units<'u>(
        &self,
        phase: u32,
        units: &'u [SourceUnit],
    ) -> Result<Option<Vec<&'u SourceUnit>>, ManifestError> {
        let Some(assignment) = self.phases.get(&phase) else {
            return Ok(None);
        };
        let patterns = compile(phase, &assignment.patterns)?;
        let explicit: BTreeSet<&str> = assignment.files.iter().map(String::as_str).collect();
        let assigned = units
            .iter()
            .filter(|u| u.kind == UnitKind::File)
            .filter(|u| explicit.contains(u.path.as_str()) || patterns.is_match(&u.path))
            .collect();
        Ok(Some(assigned))
    }

    /// Recomputes `stats` and `outputs` against the current tree.
    ///
    /// `outputs[phase]` lists the artifacts that exist for the phase's
    /// assigned files. Returns the number of output artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Pattern`] if any phase pattern is invalid.
    pub fn sync_outputs(
        &mut self,
        store: &ArtifactStore<'_>,
        units: &[SourceUnit],
    ) -> Result<usize, ManifestError> {
        let mut stats = ManifestStats {
            total_files: units.iter().filter(|u| u.kind == UnitKind::File).count(),
            ..ManifestStats::default()
        };
        let mut assigned_any = BTreeSet::new();
        let mut outputs = BTreeMap::new();

        for &phase in self.phases.keys() {
            let assigned = self.phase_units(phase, units)?.unwrap_or_default();
            stats.phase_counts.insert(phase, assigned.len());
            let mut produced: Vec<String> = assigned
                .iter()
                .filter(|u| store.exists(u))
                .map(|u| u.artifact_path())
                .collect();
            produced.sort();
            assigned_any.extend(assigned.iter().map(|u| u.path.as_str()));
            outputs.insert(phase, produced);
        }

        stats.assigned_files = assigned_any.len();
        stats.coverage_ratio = if stats.total_files == 0 {
            1.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let ratio = stats.assigned_files as f64 / stats.total_files as f64;
            ratio
        };
        let produced = outputs.values().map(Vec::len).sum();
        self.stats = stats;
        self.outputs = outputs;
        Ok(produced)
    }
}

fn compile(phase: u32, patterns: &[String]) -> Result<GlobSet, ManifestError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| ManifestError::Pattern { phase, source })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ManifestError::Pattern { phase, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryFileSystem;
    use chrono::{DateTime, Utc};

    fn ctx(fs: MemoryFileSystem) -> ServiceContext {
        let now = DateTime::parse_from_rfc3339("2025-06-15T10:00:00Z").unwrap().with_timezone(&Utc);
        ServiceContext::with_fs(fs, now)
    }

    fn units() -> Vec<SourceUnit> {
        vec![
            SourceUnit::directory("src"),
            SourceUnit::directory("src/api"),
            SourceUnit::file("src/api/handler.ts"),
            SourceUnit::file("src/api/routes.ts"),
            SourceUnit::file("src/index.ts"),
            SourceUnit::file("src/util.ts"),
            SourceUnit::root(),
        ]
    }

    const MANIFEST: &str = "\
phases:
  1:
    files: [src/index.ts]
    patterns: [\"src/api/**\"]
  2:
    files: [src/util.ts]
";

    #[test]
    fn phase_units_combine_files_and_patterns() {
        let manifest: Manifest = serde_yaml::from_str(MANIFEST).unwrap();
        let units = units();
        let phase1: Vec<&str> = manifest
            .phase_units(1, &units)
            .unwrap()
            .unwrap()
            .iter()
            .map(|u| u.path.as_str())
            .collect();
        assert_eq!(phase1, vec!["src/api/handler.ts", "src/api/routes.ts", "src/index.ts"]);
        assert!(manifest.phase_units(9, &units).unwrap().is_none());
    }

    #[test]
    fn declared_files_only_without_patterns() {
        let manifest: Manifest = serde_yaml::from_str(MANIFEST).unwrap();
        assert!(manifest.declared_files(1).is_none());
        assert_eq!(manifest.declared_files(2), Some(&["src/util.ts".to_string()][..]));
    }

    #[test]
    fn sync_outputs_lists_existing_artifacts_and_stats() {
        let ctx = ctx(MemoryFileSystem::new()
            .with_file("/p/src/index.ts.au", "summary: s\n")
            .with_file("/p/src/api/routes.ts.au", "summary: s\n"));
        let store = ArtifactStore::new(&ctx, Path::new("/p"));
        let mut manifest: Manifest = serde_yaml::from_str(MANIFEST).unwrap();

        let produced = manifest.sync_outputs(&store, &units()).unwrap();
        assert_eq!(produced, 2);
        assert_eq!(manifest.outputs[&1], vec!["src/api/routes.ts.au", "src/index.ts.au"]);
        assert!(manifest.outputs[&2].is_empty());
        assert_eq!(manifest.stats.total_files, 4);
        assert_eq!(manifest.stats.assigned_files, 4);
        assert!((manifest.stats.coverage_ratio - 1.0).abs() < f64::EPSILON);
        assert_eq!(manifest.stats.phase_counts[&1], 3);
    }

    #[test]
    fn save_then_load_round_trips() {
        let ctx = ctx(MemoryFileSystem::new());
        let path = Manifest::path_in(Path::new("/state"));
        let manifest: Manifest = serde_yaml::from_str(MANIFEST).unwrap();
        manifest.save(&ctx, &path).unwrap();
        assert_eq!(Manifest::load(&ctx, &path), Some(manifest));
    }

    #[test]
    fn corrupt_or_missing_manifest_is_none() {
        let ctx = ctx(MemoryFileSystem::new().with_file("/state/manifest.yaml", "phases: [x"));
        assert!(Manifest::load(&ctx, Path::new("/state/manifest.yaml")).is_none());
        assert!(Manifest::load(&ctx, Path::new("/state/other.yaml")).is_none());
    }

    #[test]
    fn invalid_pattern_names_its_phase() {
        let manifest: Manifest = serde_yaml::from_str("phases:\n  3:\n    patterns: [\"a[\"]\n").unwrap();
        let err = manifest.phase_units(3, &units()).unwrap_err();
        assert!(err.to_string().contains("phase 3"));
    }
}
