//! Cycle state store: per-phase sets of already consumed source paths.
//!
//! The whole store is a single YAML document:
//!
//! ```text
//! phases:
//!   "1":
//!     consumed: [src/a.ts, src/b.ts]
//!     updated_at: 2025-06-15T10:00:00Z
//! ```
//!
//! Every save reads the document, replaces one phase record and writes the
//! whole document to a temporary file that is then renamed into place.
//! Two processes saving to the same store concurrently can still lose an
//! update; one pipeline process owns a store at a time.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::context::ServiceContext;
use crate::ports::PortError;

/// File name of the store inside the state directory.
pub const STATE_FILE: &str = "cycle-state.yaml";

/// Consumed paths of one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// Sorted consumed source paths.
    pub consumed: Vec<String>,
    /// When this record was last saved.
    pub updated_at: DateTime<Utc>,
}

/// On-disk document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStateDocument {
    /// Records keyed by phase.
    #[serde(default)]
    pub phases: BTreeMap<String, PhaseRecord>,
}

/// Failures writing the store. Reads never fail.
#[derive(Debug, Error)]
pub enum StateError {
    /// The document could not be serialized.
    #[error("failed to serialize state document: {0}")]
    Serialize(#[from] serde_yaml::Error),
    /// Writing, renaming, or removing the store file failed.
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        /// What was being attempted.
        action: &'static str,
        /// File involved.
        path: PathBuf,
        /// Underlying port error.
        #[source]
        source: PortError,
    },
}

/// Persistence for per-phase consumed sets.
pub struct CycleStateStore<'a> {
    ctx: &'a ServiceContext,
    path: PathBuf,
}

impl<'a> CycleStateStore<'a> {
    /// Creates a store backed by the file at `path`.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, path: &Path) -> Self {
        Self { ctx, path: path.to_path_buf() }
    }

    /// Creates a store at `<state_dir>/cycle-state.yaml`.
    #[must_use]
    pub fn in_dir(ctx: &'a ServiceContext, state_dir: &Path) -> Self {
        Self::new(ctx, &state_dir.join(STATE_FILE))
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole document; absent or corrupt stores read as empty.
    #[must_use]
    pub fn load_document(&self) -> CycleStateDocument {
        if !self.ctx.fs.exists(&self.path) {
            return CycleStateDocument::default();
        }
        let text = match self.ctx.fs.read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "unreadable cycle state, starting over");
                return CycleStateDocument::default();
            }
        };
        if text.trim().is_empty() {
            return CycleStateDocument::default();
        }
        serde_yaml::from_str(&text).unwrap_or_else(|err| {
            warn!(path = %self.path.display(), error = %err, "corrupt cycle state, starting over");
            CycleStateDocument::default()
        })
    }

    /// Consumed paths of `phase`; empty when unknown.
    #[must_use]
    pub fn load(&self, phase: &str) -> BTreeSet<String> {
        self.load_document()
            .phases
            .remove(phase)
            .map(|record| record.consumed.into_iter().collect())
            .unwrap_or_default()
    }

    /// Every stored phase record, keyed by phase.
    #[must_use]
    pub fn phases(&self) -> BTreeMap<String, PhaseRecord> {
        self.load_document().phases
    }

    /// Replaces the record of `phase`, preserving every other phase.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the document cannot be written.
    pub fn save(&self, phase: &str, consumed: &BTreeSet<String>) -> Result<(), StateError> {
        let mut doc = self.load_document();
        doc.phases.insert(
            phase.to_string(),
            PhaseRecord {
                consumed: consumed.iter().cloned().collect(),
                updated_at: self.ctx.clock.now(),
            },
        );
        self.write_document(&doc)?;
        debug!(phase, consumed = consumed.len(), "cycle state saved");
        Ok(())
    }

    /// Adds `paths` to the consumed set of `phase` and saves.
    ///
    /// Returns the merged set.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the document cannot be written.
    pub fn consume<I, S>(&self, phase: &str, paths: I) -> Result<BTreeSet<String>, StateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut consumed = self.load(phase);
        consumed.extend(paths.into_iter().map(Into::into));
        self.save(phase, &consumed)?;
        Ok(consumed)
    }

    /// Drops the record of `phase`. Returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the document cannot be written.
    pub fn reset(&self, phase: &str) -> Result<bool, StateError> {
        let mut doc = self.load_document();
        if doc.phases.remove(phase).is_none() {
            return Ok(false);
        }
        self.write_document(&doc)?;
        Ok(true)
    }

    /// Deletes the whole store.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if an existing store cannot be removed.
    pub fn clear(&self) -> Result<(), StateError> {
        if !self.ctx.fs.exists(&self.path) {
            return Ok(());
        }
        self.ctx.fs.remove_file(&self.path).map_err(|err| StateError::Io {
            action: "remove",
            path: self.path.clone(),
            source: err,
        })
    }

    fn write_document(&self, doc: &CycleStateDocument) -> Result<(), StateError> {
        write_atomic(self.ctx, &self.path, &serde_yaml::to_string(doc)?)
    }
}

/// Writes `contents` to `<path>.tmp` and renames it over `path`.
///
/// # Errors
///
/// Returns [`StateError::Io`] if either step fails.
pub fn write_atomic(ctx: &ServiceContext, path: &Path, contents: &str) -> Result<(), StateError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    ctx.fs.write(&tmp, contents).map_err(|err| StateError::Io {
        action: "write",
        path: tmp.clone(),
        source: err,
    })?;
    ctx.fs.rename(&tmp, path).map_err(|err| StateError::Io {
        action: "rename",
        path: path.to_path_buf(),
        source: err,
    })
}
