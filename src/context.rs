//! Service context bundling all port trait objects.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::adapters::live::clock::{FixedClock, LiveClock};
use crate::adapters::live::filesystem::LiveFileSystem;
use crate::adapters::live::shell::LiveShellExecutor;
use crate::ports::clock::Clock;
use crate::ports::filesystem::FileSystem;
use crate::ports::shell::ShellExecutor;

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. Every port is
/// `Send + Sync`, so a `&ServiceContext` can be shared with the parallel
/// per-unit reads of a scan.
pub struct ServiceContext {
    /// Clock for obtaining the current time.
    pub clock: Box<dyn Clock>,
    /// Filesystem for artifact and state I/O.
    pub fs: Box<dyn FileSystem>,
    /// Shell executor for running the worker command.
    pub shell: Box<dyn ShellExecutor>,
}

impl ServiceContext {
    /// Creates a live context whose shell commands run in the current directory.
    #[must_use]
    pub fn live() -> Self {
        Self {
            clock: Box::new(LiveClock),
            fs: Box::new(LiveFileSystem),
            shell: Box::new(LiveShellExecutor::default()),
        }
    }

    /// Creates a live context whose shell commands run inside `root`.
    #[must_use]
    pub fn live_in(root: &Path) -> Self {
        Self { shell: Box::new(LiveShellExecutor::in_dir(root)), ..Self::live() }
    }

    /// Creates a context over the given filesystem with a frozen clock.
    ///
    /// The shell stays live; callers that never dispatch a worker never touch it.
    #[must_use]
    pub fn with_fs(fs: impl FileSystem + 'static, now: DateTime<Utc>) -> Self {
        Self {
            clock: Box::new(FixedClock(now)),
            fs: Box::new(fs),
            shell: Box::new(LiveShellExecutor::default()),
        }
    }
}
