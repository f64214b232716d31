//! `mirrordoc run` command.

use crate::artifact::ArtifactStore;
use crate::context::ServiceContext;
use crate::run::{self, Orchestrator, RunOptions, RunOutcome, RunState, ShellWorker};

use super::{to_json, Invocation};

/// Flags of the `run` command; unset values fall back to the config.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Worker command template.
    pub worker_cmd: Option<String>,
    /// Worker turn cap.
    pub max_iterations: Option<usize>,
    /// Units per worker turn.
    pub batch: Option<usize>,
    /// Delete every artifact and the cycle state first.
    pub purge: bool,
}

/// Execute the `run` command.
///
/// `done` and `suspended` runs succeed; an aborted run is an error carrying
/// its cause.
///
/// # Errors
///
/// Returns an error string if no worker command is configured, the root
/// cannot be scanned, purging fails, or the run aborts.
pub fn run_with_context(
    ctx: &ServiceContext,
    invocation: &Invocation,
    args: &RunArgs,
) -> Result<(), String> {
    let (outcome, text) = execute(ctx, invocation, args)?;
    println!("{text}");
    if outcome.state == RunState::Aborted {
        return Err(format!(
            "run aborted: {}",
            outcome.cause.as_deref().unwrap_or("unknown cause")
        ));
    }
    Ok(())
}

fn execute(
    ctx: &ServiceContext,
    invocation: &Invocation,
    args: &RunArgs,
) -> Result<(RunOutcome, String), String> {
    let config = &invocation.config;
    let template = args.worker_cmd.clone().or_else(|| config.worker_cmd.clone()).ok_or_else(|| {
        "no worker command configured; pass --worker-cmd or set worker_cmd in mirrordoc.yaml"
            .to_string()
    })?;

    if args.purge {
        let state = invocation.state_store(ctx);
        let removed =
            run::purge(ctx, &invocation.root, &invocation.collect_options(), &state)
                .map_err(|e| e.to_string())?;
        if !invocation.json {
            println!("Purged {removed} artifact(s).");
        }
    }

    let options = RunOptions {
        collect: invocation.collect_options(),
        batch_size: args.batch.unwrap_or(config.batch_size),
        max_iterations: args.max_iterations.or(config.max_iterations),
    };
    let store = ArtifactStore::new(ctx, &invocation.root);
    let mut worker = ShellWorker::new(&store, template);
    let outcome = Orchestrator::new(ctx, &invocation.root, options)
        .run(&mut worker)
        .map_err(|e| e.to_string())?;

    let text = if invocation.json { to_json(&outcome)? } else { summary(&outcome) };
    Ok((outcome, text))
}

fn summary(outcome: &RunOutcome) -> String {
    let snapshot = &outcome.snapshot;
    let coverage = format!(
        "{}/{} units documented ({}%)",
        snapshot.documented_items,
        snapshot.total_items,
        snapshot.coverage_percent()
    );
    let turns = outcome.iterations;
    match outcome.state {
        RunState::Done => format!("Run complete after {turns} turn(s): {coverage}."),
        RunState::Suspended => format!(
            "Run suspended after {turns} turn(s): {} of {} units documented. Run again to resume.",
            outcome.counts.documented, outcome.counts.total
        ),
        _ => format!(
            "Run stopped after {turns} turn(s): {}",
            outcome.cause.as_deref().unwrap_or("unknown cause")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::Path;

    const WRITE_FILE_DOC: &str =
        "printf 'layer: l\\nsummary: s\\npurpose: p\\nkey_logic: k\\n' > {artifact}";

    fn invocation(root: &Path, worker_cmd: Option<&str>) -> Invocation {
        Invocation {
            root: root.to_path_buf(),
            config: Config { worker_cmd: worker_cmd.map(str::to_string), ..Config::default() },
            json: false,
        }
    }

    #[test]
    fn missing_worker_command_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ServiceContext::live_in(dir.path());
        let err = execute(&ctx, &invocation(dir.path(), None), &RunArgs::default()).unwrap_err();
        assert!(err.contains("no worker command configured"));
    }

    #[test]
    fn empty_tree_completes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ServiceContext::live_in(dir.path());
        let (outcome, text) =
            execute(&ctx, &invocation(dir.path(), Some("true")), &RunArgs::default()).unwrap();
        assert_eq!(outcome.state, RunState::Done);
        assert_eq!(text, "Run complete after 0 turn(s): 0/0 units documented (100%).");
    }

    #[test]
    fn shell_worker_suspends_at_cap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "a").unwrap();
        std::fs::write(dir.path().join("b.ts"), "b").unwrap();
        let ctx = ServiceContext::live_in(dir.path());
        let args = RunArgs { max_iterations: Some(1), batch: Some(1), ..RunArgs::default() };

        let (outcome, text) =
            execute(&ctx, &invocation(dir.path(), Some(WRITE_FILE_DOC)), &args).unwrap();
        assert_eq!(outcome.state, RunState::Suspended);
        assert!(dir.path().join("a.ts.au").exists());
        assert!(!dir.path().join("b.ts.au").exists());
        assert!(text.starts_with("Run suspended after 1 turn(s): 1 of 3 units documented."));
    }

    #[test]
    fn failing_worker_aborts_with_cause() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "a").unwrap();
        let ctx = ServiceContext::live_in(dir.path());
        let inv = invocation(dir.path(), Some("echo nope >&2; exit 4"));

        let (outcome, _) = execute(&ctx, &inv, &RunArgs::default()).unwrap();
        assert_eq!(outcome.state, RunState::Aborted);
        assert_eq!(outcome.cause.as_deref(), Some("worker failed for a.ts (exit 4): nope"));
        assert!(run_with_context(&ctx, &inv, &RunArgs::default()).unwrap_err().starts_with("run aborted"));
    }

    #[test]
    fn purge_removes_existing_artifacts_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "a").unwrap();
        std::fs::write(dir.path().join("old.ts.au"), "summary: s\n").unwrap();
        let ctx = ServiceContext::live_in(dir.path());
        let args = RunArgs { purge: true, max_iterations: Some(0), ..RunArgs::default() };

        let (outcome, _) = execute(&ctx, &invocation(dir.path(), Some("true")), &args).unwrap();
        assert_eq!(outcome.state, RunState::Suspended);
        assert!(!dir.path().join("old.ts.au").exists());
        assert!(outcome.snapshot.orphaned_artifacts.is_empty());
    }
}
