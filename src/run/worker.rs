//! The worker seam and the shell-command worker.

use thiserror::Error;
use tracing::{debug, warn};

use crate::artifact::{store::outcome, ArtifactRead, ArtifactStore};
use crate::ports::PortError;
use crate::progress::{ProgressCounts, WorkerEvent};
use crate::scan::SourceUnit;

/// One unit handed to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// The unit whose artifact should be written or reworked.
    pub unit: SourceUnit,
    /// Fingerprint to record in the artifact's `meta.source_hash`.
    pub fingerprint: Option<String>,
}

/// Everything a worker sees for one turn.
#[derive(Debug, Clone)]
pub struct WorkBrief {
    /// 1-based turn number within the run.
    pub iteration: usize,
    /// Units to work on this turn: pending first, then open issues.
    pub items: Vec<WorkItem>,
    /// Orphaned artifact paths to delete this turn.
    pub orphans: Vec<String>,
    /// Tagged issue lines of the current snapshot.
    pub issues: Vec<String>,
    /// Progress at the start of the turn.
    pub counts: ProgressCounts,
}

/// Result of a successful worker turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerTurn {
    /// Artifacts were written.
    Progress(Vec<WorkerEvent>),
    /// The worker has nothing more to do with this brief.
    Finished,
}

/// Hard worker failures; each one aborts the run.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker command could not be started.
    #[error("failed to run worker for {path}: {source}")]
    Spawn {
        /// Unit being worked on.
        path: String,
        /// Underlying port error.
        #[source]
        source: PortError,
    },
    /// The worker command exited non-zero.
    #[error("worker failed for {path} (exit {code}): {stderr}")]
    Command {
        /// Unit being worked on.
        path: String,
        /// Exit status.
        code: i32,
        /// Trimmed standard error.
        stderr: String,
    },
    /// Any other failure reported by a worker implementation.
    #[error("{0}")]
    Other(String),
}

/// External collaborator that writes artifacts.
pub trait Worker {
    /// Performs one turn of work on `brief`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] on a failure the run cannot continue past.
    fn turn(&mut self, brief: &WorkBrief) -> Result<WorkerTurn, WorkerError>;
}

/// Runs a shell command once per work item and deletes orphaned artifacts.
///
/// The command template may contain `{path}` and `{artifact}`, replaced by
/// the single-quoted source and artifact paths relative to the root. The
/// command runs through the context's [`crate::ports::ShellExecutor`].
/// Only a command that creates or changes the artifact counts as progress;
/// the unit's fingerprint is stamped into that new artifact.
pub struct ShellWorker<'a> {
    store: &'a ArtifactStore<'a>,
    template: String,
}

impl<'a> ShellWorker<'a> {
    /// Creates a worker writing through `store`.
    #[must_use]
    pub fn new(store: &'a ArtifactStore<'a>, template: impl Into<String>) -> Self {
        Self { store, template: template.into() }
    }

    /// The command for one unit.
    #[must_use]
    pub fn render(&self, unit: &SourceUnit) -> String {
        self.template
            .replace("{path}", &shell_quote(&unit.path))
            .replace("{artifact}", &shell_quote(&unit.artifact_path()))
    }

    fn process(&self, item: &WorkItem) -> Result<Option<WorkerEvent>, WorkerError> {
        let path = &item.unit.path;
        let before = self.store.raw(&item.unit);
        let command = self.render(&item.unit);
        debug!(%path, %command, "running worker command");

        let output = self
            .store
            .context()
            .shell
            .run(&command)
            .map_err(|source| WorkerError::Spawn { path: path.clone(), source })?;
        if output.exit_code != 0 {
            return Err(WorkerError::Command {
                path: path.clone(),
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        if before.is_some() && self.store.raw(&item.unit) == before {
            warn!(%path, "worker command left the artifact unchanged");
            return Ok(None);
        }
        let doc = match self.store.read(&item.unit) {
            ArtifactRead::Parsed(doc) => doc,
            ArtifactRead::Missing => {
                warn!(%path, "worker command wrote no artifact");
                return Ok(None);
            }
            ArtifactRead::Unparsable(message) => {
                warn!(%path, %message, "worker command wrote an unparsable artifact");
                return Ok(None);
            }
        };
        if item.fingerprint.is_some() && doc.source_hash() != item.fingerprint.as_deref() {
            self.store
                .write(&item.unit, &doc, item.fingerprint.clone())
                .map_err(|err| WorkerError::Other(err.to_string()))?;
        }
        let current = self.store.size(&item.unit).unwrap_or(0);
        let previous = before.map(|bytes| bytes.len() as u64);
        let change = outcome(previous, current);
        Ok(Some(WorkerEvent {
            unit_path: path.clone(),
            is_new: change.is_new,
            byte_delta: change.byte_delta,
        }))
    }

    fn remove_orphan(&self, artifact: &str) -> Result<Option<WorkerEvent>, WorkerError> {
        let removed =
            self.store.remove(artifact).map_err(|err| WorkerError::Other(err.to_string()))?;
        Ok(removed.map(|size| {
            debug!(artifact, "removed orphaned artifact");
            WorkerEvent {
                unit_path: artifact.to_string(),
                is_new: false,
                byte_delta: -i64::try_from(size).unwrap_or(i64::MAX),
            }
        }))
    }
}

impl Worker for ShellWorker<'_> {
    /// Processes every item and orphan; a turn that changes nothing is
    /// `Finished`.
    fn turn(&mut self, brief: &WorkBrief) -> Result<WorkerTurn, WorkerError> {
        let mut events = Vec::new();
        for item in &brief.items {
            events.extend(self.process(item)?);
        }
        for artifact in &brief.orphans {
            events.extend(self.remove_orphan(artifact)?);
        }
        if events.is_empty() {
            return Ok(WorkerTurn::Finished);
        }
        Ok(WorkerTurn::Progress(events))
    }
}

/// Quotes `value` for a POSIX shell.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
