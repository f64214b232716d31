//! Orchestrator: drives a [`Worker`] until the tree has no work left.
//!
//! ```text
//! Scanning -> Validated -> Dispatching -> ProgressUpdated -> Dispatching ...
//!                 |             |                 |
//!                 v             v                 v
//!               Done   Suspended / Aborted     Scanning (tracker drained)
//! ```
//!
//! A worker `Finished` turn also goes back to `Scanning`. Every unit with
//! an open issue is dispatched again, and orphaned artifacts are handed to
//! the worker for removal. If the rescan after a pass shows exactly the
//! work seen before it, the run is aborted.

pub mod worker;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::artifact::{ArtifactError, ArtifactStore};
use crate::context::ServiceContext;
use crate::coverage::{self, CollectOptions, CoverageSnapshot};
use crate::cycle::state::{CycleStateStore, StateError};
use crate::progress::{ProgressCounts, ProgressTracker};
use crate::scan::{self, ScanError, SourceUnit};
use crate::validate;

pub use worker::{ShellWorker, WorkBrief, WorkItem, Worker, WorkerError, WorkerTurn};

/// Default number of items per worker turn.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Orchestrator states. `Done`, `Suspended`, and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Taking a fresh snapshot.
    Scanning,
    /// Snapshot taken; deciding whether work remains.
    Validated,
    /// Handing a brief to the worker.
    Dispatching,
    /// Worker events applied to the tracker.
    ProgressUpdated,
    /// Nothing left to do.
    Done,
    /// Iteration cap reached; a later run resumes from the artifacts on disk.
    Suspended,
    /// The worker failed or stopped making progress.
    Aborted,
}

impl RunState {
    /// `true` for states that end a run.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Suspended | Self::Aborted)
    }
}

/// Failures that stop a run before it reaches a terminal state.
#[derive(Debug, Error)]
pub enum RunError {
    /// The source root could not be scanned.
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// An artifact could not be removed.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    /// The cycle state could not be cleared.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Run parameters.
#[derive(Clone)]
pub struct RunOptions {
    /// Scan options.
    pub collect: CollectOptions,
    /// Items per worker turn.
    pub batch_size: usize,
    /// Maximum worker turns; `None` for no cap.
    pub max_iterations: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { collect: CollectOptions::default(), batch_size: DEFAULT_BATCH_SIZE, max_iterations: None }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Terminal state.
    pub state: RunState,
    /// Worker turns taken.
    pub iterations: usize,
    /// Why the run was aborted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Tracker counts at the end.
    pub counts: ProgressCounts,
    /// Net artifact bytes written.
    pub bytes_written: i64,
    /// Last snapshot taken.
    pub snapshot: CoverageSnapshot,
}

/// Work seen by one scan: pending paths plus every issue line.
#[derive(Debug, PartialEq, Eq)]
struct WorkSignature {
    pending: Vec<String>,
    issues: Vec<String>,
}

impl WorkSignature {
    fn of(snapshot: &CoverageSnapshot) -> Self {
        Self {
            pending: snapshot.pending_items.iter().map(|u| u.path.clone()).collect(),
            issues: coverage::issue_lines(snapshot),
        }
    }
}

/// Work left before a pass, and the cause to report if the pass changed
/// nothing.
struct PassRecord {
    before: WorkSignature,
    stall_cause: &'static str,
}

/// Coverage state machine over one source root.
pub struct Orchestrator<'a> {
    ctx: &'a ServiceContext,
    root: PathBuf,
    options: RunOptions,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator for the tree at `root`.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, root: &Path, options: RunOptions) -> Self {
        Self { ctx, root: root.to_path_buf(), options }
    }

    /// Runs until a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Scan`] if the source root becomes unreadable.
    pub fn run(&self, worker: &mut dyn Worker) -> Result<RunOutcome, RunError> {
        let mut state = RunState::Scanning;
        let mut snapshot = CoverageSnapshot::default();
        let mut tracker = ProgressTracker::default();
        let mut iterations = 0;
        let mut cause = None;
        let mut last_pass: Option<PassRecord> = None;

        while !state.is_terminal() {
            debug!(?state, iterations, "orchestrator step");
            state = match state {
                RunState::Scanning => {
                    snapshot = coverage::collect(self.ctx, &self.root, &self.options.collect)?;
                    RunState::Validated
                }
                RunState::Validated => {
                    let stall = last_pass
                        .take()
                        .filter(|pass| pass.before == WorkSignature::of(&snapshot));
                    if !snapshot.has_work() {
                        RunState::Done
                    } else if let Some(pass) = stall {
                        cause = Some(pass.stall_cause.to_string());
                        RunState::Aborted
                    } else {
                        tracker.init(&snapshot);
                        RunState::Dispatching
                    }
                }
                RunState::Dispatching => {
                    if self.options.max_iterations.is_some_and(|cap| iterations >= cap) {
                        RunState::Suspended
                    } else {
                        iterations += 1;
                        let brief = self.brief(&snapshot, &tracker, iterations);
                        match worker.turn(&brief) {
                            Ok(WorkerTurn::Progress(events)) => {
                                for event in &events {
                                    tracker.apply(event);
                                }
                                RunState::ProgressUpdated
                            }
                            Ok(WorkerTurn::Finished) => {
                                last_pass = Some(PassRecord {
                                    before: WorkSignature::of(&snapshot),
                                    stall_cause: "no progress: worker finished but the same work remains",
                                });
                                RunState::Scanning
                            }
                            Err(err) => {
                                cause = Some(err.to_string());
                                RunState::Aborted
                            }
                        }
                    }
                }
                RunState::ProgressUpdated => {
                    if tracker.is_drained() {
                        last_pass = Some(PassRecord {
                            before: WorkSignature::of(&snapshot),
                            stall_cause: "no progress: a full worker pass left the same work",
                        });
                        RunState::Scanning
                    } else {
                        RunState::Dispatching
                    }
                }
                terminal @ (RunState::Done | RunState::Suspended | RunState::Aborted) => terminal,
            };
        }

        info!(?state, iterations, bytes = tracker.bytes_written(), "run finished");
        Ok(RunOutcome {
            state,
            iterations,
            cause,
            counts: tracker.counts(),
            bytes_written: tracker.bytes_written(),
            snapshot,
        })
    }

    /// Builds the brief for one turn: pending units first, then units with
    /// open issues, then orphans to remove, up to the batch size.
    fn brief(&self, snapshot: &CoverageSnapshot, tracker: &ProgressTracker, iteration: usize) -> WorkBrief {
        let batch = self.options.batch_size.max(1);
        let by_path: HashMap<&str, &SourceUnit> =
            snapshot.items.iter().map(|u| (u.path.as_str(), u)).collect();

        let mut chosen: Vec<&str> = tracker.pending_items(batch);
        let already: HashSet<&str> = chosen.iter().copied().collect();
        let room = batch - chosen.len();
        chosen.extend(tracker.open_issues().into_iter().filter(|p| !already.contains(p)).take(room));
        let orphans: Vec<String> = tracker
            .open_orphans()
            .into_iter()
            .take(batch - chosen.len())
            .map(str::to_string)
            .collect();

        let store = ArtifactStore::new(self.ctx, &self.root);
        let items = chosen
            .into_iter()
            .filter_map(|path| by_path.get(path))
            .map(|unit| WorkItem {
                unit: (*unit).clone(),
                fingerprint: validate::current_fingerprint(&store, &snapshot.items, unit),
            })
            .collect();

        WorkBrief {
            iteration,
            items,
            orphans,
            issues: coverage::issue_lines(snapshot),
            counts: tracker.counts(),
        }
    }
}

/// Deletes every artifact the scan described by `options` reaches, then
/// clears the cycle state.
///
/// Artifacts are found wherever the walk descends, whatever the include
/// patterns. Returns the number of artifacts removed.
///
/// # Errors
///
/// Returns [`RunError`] if the scan fails or a file cannot be removed.
pub fn purge(
    ctx: &ServiceContext,
    root: &Path,
    options: &CollectOptions,
    state: &CycleStateStore<'_>,
) -> Result<usize, RunError> {
    let scanned = scan::scan_with(root, options)?;
    let store = ArtifactStore::new(ctx, root);
    let mut removed = 0;
    for artifact in &scanned.artifacts {
        if store.remove(artifact)?.is_some() {
            removed += 1;
        }
    }
    state.clear()?;
    info!(removed, "artifacts purged");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::live::filesystem::LiveFileSystem;
    use crate::progress::WorkerEvent;
    use chrono::Utc;

    const FILE_DOC: &str = "layer: l\nsummary: s\npurpose: p\nkey_logic: k\n";
    const DIR_DOC: &str = "summary: s\nresponsibility: r\n";

    fn touch(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    /// Writes complete artifacts and removes orphans directly, one turn per
    /// brief. A quiet worker reports `Finished` instead of its events.
    struct DirectWorker {
        root: PathBuf,
        briefs: Vec<usize>,
        quiet: bool,
    }

    impl DirectWorker {
        fn new(root: &Path) -> Self {
            Self { root: root.to_path_buf(), briefs: vec![], quiet: false }
        }

        fn body(&self, unit: &SourceUnit) -> String {
            if !unit.kind.is_container() {
                return FILE_DOC.to_string();
            }
            let dir = if unit.path == "." { self.root.clone() } else { self.root.join(&unit.path) };
            let mut children: Vec<String> = std::fs::read_dir(dir)
                .unwrap()
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| !name.ends_with(".au"))
                .collect();
            children.sort();
            format!("{DIR_DOC}architecture: a\ncontents: [{}]\n", children.join(", "))
        }
    }

    impl Worker for DirectWorker {
        fn turn(&mut self, brief: &WorkBrief) -> Result<WorkerTurn, WorkerError> {
            self.briefs.push(brief.items.len() + brief.orphans.len());
            let mut events = Vec::new();
            for item in &brief.items {
                let body = self.body(&item.unit);
                touch(&self.root, &item.unit.artifact_path(), &body);
                events.push(WorkerEvent {
                    unit_path: item.unit.path.clone(),
                    is_new: true,
                    byte_delta: i64::try_from(body.len()).unwrap(),
                });
            }
            for orphan in &brief.orphans {
                std::fs::remove_file(self.root.join(orphan)).unwrap();
                events.push(WorkerEvent { unit_path: orphan.clone(), is_new: false, byte_delta: -1 });
            }
            if events.is_empty() || self.quiet {
                return Ok(WorkerTurn::Finished);
            }
            Ok(WorkerTurn::Progress(events))
        }
    }

    /// Writes the same incomplete artifact for every item and reports it.
    struct SloppyWorker {
        root: PathBuf,
    }

    impl Worker for SloppyWorker {
        fn turn(&mut self, brief: &WorkBrief) -> Result<WorkerTurn, WorkerError> {
            let events = brief
                .items
                .iter()
                .map(|item| {
                    touch(&self.root, &item.unit.artifact_path(), "summary: s\n");
                    WorkerEvent { unit_path: item.unit.path.clone(), is_new: false, byte_delta: 0 }
                })
                .collect();
            Ok(WorkerTurn::Progress(events))
        }
    }

    struct FailingWorker;

    impl Worker for FailingWorker {
        fn turn(&mut self, _brief: &WorkBrief) -> Result<WorkerTurn, WorkerError> {
            Err(WorkerError::Other("model unavailable".into()))
        }
    }

    struct IdleWorker;

    impl Worker for IdleWorker {
        fn turn(&mut self, _brief: &WorkBrief) -> Result<WorkerTurn, WorkerError> {
            Ok(WorkerTurn::Finished)
        }
    }

    fn ctx() -> ServiceContext {
        ServiceContext::with_fs(LiveFileSystem, Utc::now())
    }

    #[test]
    fn empty_tree_is_done_without_dispatching() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx();
        let outcome =
            Orchestrator::new(&ctx, dir.path(), RunOptions::default()).run(&mut IdleWorker).unwrap();
        assert_eq!(outcome.state, RunState::Done);
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn documents_everything_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/index.ts", "a");
        touch(dir.path(), "src/util.ts", "b");
        let ctx = ctx();
        let mut worker = DirectWorker::new(dir.path());
        let options = RunOptions { batch_size: 3, ..RunOptions::default() };

        let outcome = Orchestrator::new(&ctx, dir.path(), options).run(&mut worker).unwrap();
        assert_eq!(outcome.state, RunState::Done, "{:?}", outcome.cause);
        assert_eq!(worker.briefs, vec![3, 1]);
        assert_eq!(outcome.snapshot.coverage_percent(), 100);
        assert!(outcome.bytes_written > 0);
    }

    #[test]
    fn extensionless_files_are_documented_beside_the_source() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Makefile", "all:");
        touch(dir.path(), "src/main.ts", "x");
        let ctx = ctx();
        let mut worker = DirectWorker::new(dir.path());

        let outcome =
            Orchestrator::new(&ctx, dir.path(), RunOptions::default()).run(&mut worker).unwrap();
        assert_eq!(outcome.state, RunState::Done, "{:?}", outcome.cause);
        assert!(dir.path().join("Makefile.au").is_file());
        assert!(outcome.snapshot.orphaned_artifacts.is_empty());
    }

    #[test]
    fn orphans_are_removed_and_the_run_completes() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.ts", "a");
        touch(dir.path(), "gone.ts.au", FILE_DOC);
        let ctx = ctx();
        let mut worker = DirectWorker::new(dir.path());

        let outcome =
            Orchestrator::new(&ctx, dir.path(), RunOptions::default()).run(&mut worker).unwrap();
        assert_eq!(outcome.state, RunState::Done, "{:?}", outcome.cause);
        assert_eq!(worker.briefs, vec![3]);
        assert!(!dir.path().join("gone.ts.au").exists());
        assert!(outcome.snapshot.orphaned_artifacts.is_empty());
    }

    #[test]
    fn reference_and_contents_issues_are_reworked() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.ts", "a");
        touch(dir.path(), "a.ts.au", &format!("{FILE_DOC}references: [gone.ts]\n"));
        touch(dir.path(), ".au", &format!("{DIR_DOC}architecture: a\ncontents: [a.ts, old.ts]\n"));
        let ctx = ctx();
        let mut worker = DirectWorker::new(dir.path());

        let outcome =
            Orchestrator::new(&ctx, dir.path(), RunOptions::default()).run(&mut worker).unwrap();
        assert_eq!(outcome.state, RunState::Done, "{:?}", outcome.cause);
        assert_eq!(worker.briefs, vec![2]);
        assert!(outcome.snapshot.stale_references.is_empty());
        assert!(outcome.snapshot.contents_issues.is_empty());
    }

    #[test]
    fn finished_turn_rescans_into_done() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.ts", "a");
        let ctx = ctx();
        let mut worker = DirectWorker { quiet: true, ..DirectWorker::new(dir.path()) };

        let outcome =
            Orchestrator::new(&ctx, dir.path(), RunOptions::default()).run(&mut worker).unwrap();
        assert_eq!(outcome.state, RunState::Done, "{:?}", outcome.cause);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.snapshot.coverage_percent(), 100);
    }

    #[test]
    fn pass_that_changes_nothing_aborts_without_a_cap() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.ts", "a");
        let ctx = ctx();
        let mut worker = SloppyWorker { root: dir.path().to_path_buf() };

        let outcome =
            Orchestrator::new(&ctx, dir.path(), RunOptions::default()).run(&mut worker).unwrap();
        assert_eq!(outcome.state, RunState::Aborted);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(
            outcome.cause.as_deref(),
            Some("no progress: a full worker pass left the same work")
        );
        assert_eq!(outcome.snapshot.documented_items, 2);
    }

    #[test]
    fn iteration_cap_suspends() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.ts", "a");
        touch(dir.path(), "b.ts", "b");
        let ctx = ctx();
        let mut worker = DirectWorker::new(dir.path());
        let options = RunOptions { batch_size: 1, max_iterations: Some(1), ..RunOptions::default() };

        let outcome = Orchestrator::new(&ctx, dir.path(), options).run(&mut worker).unwrap();
        assert_eq!(outcome.state, RunState::Suspended);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.counts.documented, 1);
    }

    #[test]
    fn worker_error_aborts_with_cause() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.ts", "a");
        let ctx = ctx();
        let outcome = Orchestrator::new(&ctx, dir.path(), RunOptions::default())
            .run(&mut FailingWorker)
            .unwrap();
        assert_eq!(outcome.state, RunState::Aborted);
        assert_eq!(outcome.cause.as_deref(), Some("model unavailable"));
    }

    #[test]
    fn finished_without_progress_aborts() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.ts", "a");
        let ctx = ctx();
        let outcome =
            Orchestrator::new(&ctx, dir.path(), RunOptions::default()).run(&mut IdleWorker).unwrap();
        assert_eq!(outcome.state, RunState::Aborted);
        assert!(outcome.cause.unwrap().starts_with("no progress"));
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn unreadable_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx();
        let result = Orchestrator::new(&ctx, &dir.path().join("missing"), RunOptions::default())
            .run(&mut IdleWorker);
        assert!(matches!(result, Err(RunError::Scan(_))));
    }

    #[test]
    fn purge_removes_artifacts_and_state() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.ts", "a");
        touch(dir.path(), "a.ts.au", FILE_DOC);
        touch(dir.path(), "gone.ts.au", FILE_DOC);
        touch(dir.path(), ".au", DIR_DOC);
        let ctx = ctx();
        let state_dir = dir.path().join(".mirrordoc");
        let state = CycleStateStore::in_dir(&ctx, &state_dir);
        state.consume("1", ["a.ts"]).unwrap();

        let removed = purge(&ctx, dir.path(), &CollectOptions::default(), &state).unwrap();
        assert_eq!(removed, 3);
        assert!(!dir.path().join("a.ts.au").exists());
        assert!(dir.path().join("a.ts").exists());
        assert!(state.load("1").is_empty());
    }
}
