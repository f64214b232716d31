//! Multi-phase pipeline: each phase consumes its candidate units once.
//!
//! A phase's candidates come from the manifest when it assigns the phase,
//! otherwise from a scan of the whole tree. Consumed paths are persisted in
//! the [`state::CycleStateStore`] after every worker turn, so an interrupted
//! phase resumes with exactly the units it has not yet consumed.

pub mod manifest;
pub mod state;

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactStore;
use crate::coverage::CollectOptions;
use crate::mapping;
use crate::progress::ProgressCounts;
use crate::run::{RunState, WorkBrief, WorkItem, Worker, WorkerTurn};
use crate::scan::{self, ScanError, SourceUnit};
use crate::validate;

use manifest::{Manifest, ManifestError};
use state::{CycleStateStore, StateError};

/// Cycle pipeline failures.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Candidate discovery failed.
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// The manifest holds an invalid pattern.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    /// Consumed paths could not be saved.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Per-phase run parameters.
#[derive(Debug, Clone, Copy)]
pub struct PhaseOptions {
    /// Items per worker turn.
    pub batch_size: usize,
    /// Maximum worker turns in this invocation.
    pub max_iterations: Option<usize>,
}

/// How a phase invocation ended.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseOutcome {
    /// Phase key.
    pub phase: String,
    /// Terminal state: `done`, `suspended`, or `aborted`.
    pub state: RunState,
    /// Candidate units of the phase.
    pub candidates: usize,
    /// Candidates consumed so far, across invocations.
    pub consumed: usize,
    /// Candidates still to consume.
    pub remaining: usize,
    /// Worker turns taken in this invocation.
    pub iterations: usize,
    /// Why the phase was aborted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// Numeric manifest key of a phase, when it has one.
#[must_use]
pub fn manifest_key(phase: &str) -> Option<u32> {
    phase.trim().parse().ok()
}

/// Candidate units of `phase`, in tree order.
///
/// A manifest phase that lists only explicit files is used as is, without
/// scanning. Otherwise the tree is scanned and, when the manifest assigns
/// the phase, narrowed to its files and patterns.
///
/// # Errors
///
/// Returns [`CycleError`] if the scan fails or a manifest pattern is invalid.
pub fn candidates(
    root: &Path,
    options: &CollectOptions,
    manifest: Option<&Manifest>,
    phase: &str,
) -> Result<Vec<SourceUnit>, CycleError> {
    let key = manifest_key(phase);
    if let (Some(manifest), Some(key)) = (manifest, key) {
        if let Some(files) = manifest.declared_files(key) {
            debug!(phase, files = files.len(), "using declared phase files");
            return Ok(files.iter().filter_map(|raw| declared_unit(raw)).collect());
        }
    }

    let scanned = scan::scan_with(root, options)?;

    match (manifest, key) {
        (Some(manifest), Some(key)) => match manifest.phase_units(key, &scanned.units)? {
            Some(assigned) => Ok(assigned.into_iter().cloned().collect()),
            None => Ok(scanned.units),
        },
        _ => Ok(scanned.units),
    }
}

fn declared_unit(raw: &str) -> Option<SourceUnit> {
    match mapping::normalize(raw) {
        Ok(path) if !mapping::is_root(&path) => Some(SourceUnit::file(path)),
        Ok(_) => None,
        Err(err) => {
            warn!(path = raw, error = %err, "skipping invalid manifest path");
            None
        }
    }
}

/// Candidates not yet consumed, in candidate order.
#[must_use]
pub fn remaining<'c>(candidates: &'c [SourceUnit], consumed: &BTreeSet<String>) -> Vec<&'c SourceUnit> {
    candidates.iter().filter(|u| !consumed.contains(&u.path)).collect()
}

/// Feeds the unconsumed candidates of `phase` to `worker`, batch by batch.
///
/// Paths named by worker events are consumed and saved after each turn. A
/// `Finished` turn ends the phase: `done` if nothing remains, `aborted`
/// otherwise.
///
/// # Errors
///
/// Returns [`CycleError::State`] if consumed paths cannot be saved.
pub fn run_phase(
    store: &ArtifactStore<'_>,
    state: &CycleStateStore<'_>,
    phase: &str,
    candidates: &[SourceUnit],
    worker: &mut dyn Worker,
    options: PhaseOptions,
) -> Result<PhaseOutcome, CycleError> {
    let batch = options.batch_size.max(1);
    let known: BTreeSet<&str> = candidates.iter().map(|u| u.path.as_str()).collect();
    let mut consumed = state.load(phase);
    let mut iterations = 0;
    let mut cause = None;

    let terminal = loop {
        let todo = remaining(candidates, &consumed);
        if todo.is_empty() {
            break RunState::Done;
        }
        if options.max_iterations.is_some_and(|cap| iterations >= cap) {
            break RunState::Suspended;
        }
        iterations += 1;

        let items = todo
            .iter()
            .take(batch)
            .map(|unit| WorkItem {
                unit: (*unit).clone(),
                fingerprint: validate::current_fingerprint(store, candidates, unit),
            })
            .collect();
        let done = candidates.len() - todo.len();
        let brief = WorkBrief {
            iteration: iterations,
            items,
            orphans: Vec::new(),
            issues: Vec::new(),
            counts: ProgressCounts { total: candidates.len(), documented: done, pending: todo.len() },
        };

        match worker.turn(&brief) {
            Ok(WorkerTurn::Progress(events)) => {
                let fresh: Vec<&str> = events
                    .iter()
                    .map(|e| e.unit_path.as_str())
                    .filter(|p| known.contains(p))
                    .collect();
                consumed.extend(fresh.iter().map(|p| (*p).to_string()));
                state.save(phase, &consumed)?;
                debug!(phase, consumed = fresh.len(), "batch consumed");
            }
            Ok(WorkerTurn::Finished) => {
                cause = Some(format!("worker finished with {} item(s) remaining", todo.len()));
                break RunState::Aborted;
            }
            Err(err) => {
                cause = Some(err.to_string());
                break RunState::Aborted;
            }
        }
    };

    let consumed_count = candidates.iter().filter(|u| consumed.contains(&u.path)).count();
    let outcome = PhaseOutcome {
        phase: phase.to_string(),
        state: terminal,
        candidates: candidates.len(),
        consumed: consumed_count,
        remaining: candidates.len() - consumed_count,
        iterations,
        cause,
    };
    info!(phase, state = ?outcome.state, remaining = outcome.remaining, "phase finished");
    Ok(outcome)
}
