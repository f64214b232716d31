//! Command dispatch and handlers.

pub mod issues;
pub mod manifest;
pub mod next;
pub mod phase;
pub mod run;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::cli::{Command, GlobalArgs};
use crate::config::{Config, CONFIG_FILE};
use crate::context::ServiceContext;
use crate::coverage::{self, CollectOptions, CoverageSnapshot};
use crate::cycle::state::CycleStateStore;
use crate::scan::GitignoreFilter;

/// Settings resolved for one invocation: flags layered over [`Config`].
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Source root.
    pub root: PathBuf,
    /// Effective configuration.
    pub config: Config,
    /// Print JSON instead of text.
    pub json: bool,
}

impl Invocation {
    /// Loads the config under the root and applies the global flags.
    ///
    /// # Errors
    ///
    /// Returns an error string if the config file is invalid.
    pub fn resolve(ctx: &ServiceContext, global: &GlobalArgs) -> Result<Self, String> {
        let mut config = Config::load(ctx, &global.root)?;
        if !global.include.is_empty() {
            config.include.clone_from(&global.include);
        }
        Ok(Self { root: global.root.clone(), config, json: global.json })
    }

    /// Invocation with default settings, for callers that skip config files.
    #[must_use]
    pub fn with_root(root: &Path) -> Self {
        Self { root: root.to_path_buf(), config: Config::default(), json: false }
    }

    /// Scan options derived from the include patterns.
    ///
    /// The config file and a state directory inside the root are never
    /// source units.
    #[must_use]
    pub fn collect_options(&self) -> CollectOptions {
        let mut owned = vec![CONFIG_FILE.to_string()];
        if let Ok(state) = self.state_dir().strip_prefix(&self.root) {
            owned.push(state.to_string_lossy().into_owned());
        }
        let filter = GitignoreFilter::for_root(&self.root).excluding(owned);
        CollectOptions { includes: self.config.include.clone(), filter: Some(Arc::new(filter)) }
    }

    /// Resolved state directory.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.config.state_dir(&self.root)
    }

    /// Cycle state store in the resolved state directory.
    #[must_use]
    pub fn state_store<'a>(&self, ctx: &'a ServiceContext) -> CycleStateStore<'a> {
        CycleStateStore::in_dir(ctx, &self.state_dir())
    }

    /// Takes a coverage snapshot of the root.
    ///
    /// # Errors
    ///
    /// Returns an error string if the root cannot be scanned.
    pub fn snapshot(&self, ctx: &ServiceContext) -> Result<CoverageSnapshot, String> {
        coverage::collect(ctx, &self.root, &self.collect_options()).map_err(|e| e.to_string())
    }
}

/// Dispatch parsed arguments to their handler.
///
/// Shell commands run inside the source root.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub fn dispatch(global: &GlobalArgs, command: &Command) -> Result<(), String> {
    let ctx = ServiceContext::live_in(&global.root);
    let invocation = Invocation::resolve(&ctx, global)?;
    dispatch_with_context(command, &ctx, &invocation)
}

/// Dispatch a command with the given service context.
fn dispatch_with_context(
    command: &Command,
    ctx: &ServiceContext,
    invocation: &Invocation,
) -> Result<(), String> {
    match command {
        Command::Status => status::run_with_context(ctx, invocation),
        Command::Next { limit } => next::run_with_context(ctx, invocation, *limit),
        Command::Issues => issues::run_with_context(ctx, invocation),
        Command::Run { worker_cmd, max_iterations, batch, purge } => run::run_with_context(
            ctx,
            invocation,
            &run::RunArgs {
                worker_cmd: worker_cmd.clone(),
                max_iterations: *max_iterations,
                batch: *batch,
                purge: *purge,
            },
        ),
        Command::Phase { action } => phase::run_with_context(ctx, invocation, action),
        Command::Manifest { action } => manifest::run_with_context(ctx, invocation, action),
    }
}

/// Pretty JSON for `--json` output.
///
/// # Errors
///
/// Returns an error string if serialization fails.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("failed to serialize output: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn custom_state_dir_and_config_are_not_source_units() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("work/state")).unwrap();
        std::fs::write(dir.path().join("a.ts"), "a").unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "state_dir: work/state\n").unwrap();
        std::fs::write(dir.path().join("work/state/cycle-state.yaml"), "phases: {}\n").unwrap();
        std::fs::write(dir.path().join("work/state/manifest.yaml.tmp"), "").unwrap();
        let ctx = ServiceContext::with_fs(crate::adapters::live::filesystem::LiveFileSystem, Utc::now());

        let invocation = Invocation {
            root: dir.path().to_path_buf(),
            config: Config::from_file(&ctx, dir.path()).unwrap(),
            json: false,
        };
        let snapshot = invocation.snapshot(&ctx).unwrap();
        let paths: Vec<&str> = snapshot.items.iter().map(|u| u.path.as_str()).collect();
        assert_eq!(paths, vec!["a.ts", "."]);
    }
}
