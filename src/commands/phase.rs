//! `mirrordoc phase` commands.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{to_json, Invocation};
use crate::artifact::ArtifactStore;
use crate::cli::PhaseAction;
use crate::context::ServiceContext;
use crate::cycle::manifest::Manifest;
use crate::cycle::{self, PhaseOptions, PhaseOutcome};
use crate::mapping;
use crate::run::{RunState, ShellWorker};
use crate::scan::SourceUnit;

#[derive(Debug, Serialize)]
struct PhaseSummary {
    phase: String,
    consumed: usize,
    updated_at: String,
}

/// Execute a `phase` subcommand.
///
/// # Errors
///
/// Returns an error string if a path is invalid, the state cannot be
/// written, candidates cannot be found, or a phase run aborts.
pub fn run_with_context(
    ctx: &ServiceContext,
    invocation: &Invocation,
    action: &PhaseAction,
) -> Result<(), String> {
    println!("{}", render(ctx, invocation, action)?);
    Ok(())
}

fn render(ctx: &ServiceContext, invocation: &Invocation, action: &PhaseAction) -> Result<String, String> {
    match action {
        PhaseAction::Show { key: Some(key) } => show_one(ctx, invocation, key),
        PhaseAction::Show { key: None } => show_all(ctx, invocation),
        PhaseAction::Consume { key, paths } => consume(ctx, invocation, key, paths),
        PhaseAction::Reset { key } => {
            let removed = invocation.state_store(ctx).reset(key).map_err(|e| e.to_string())?;
            Ok(if removed {
                format!("Phase {key} reset.")
            } else {
                format!("Phase {key} had no recorded progress.")
            })
        }
        PhaseAction::Pending { key, limit } => pending(ctx, invocation, key, *limit),
        PhaseAction::Run { key, worker_cmd, max_iterations, batch } => {
            let template =
                worker_cmd.clone().or_else(|| invocation.config.worker_cmd.clone()).ok_or_else(|| {
                    "no worker command configured; pass --worker-cmd or set worker_cmd in mirrordoc.yaml"
                        .to_string()
                })?;
            let options = PhaseOptions {
                batch_size: batch.unwrap_or(invocation.config.batch_size),
                max_iterations: max_iterations.or(invocation.config.max_iterations),
            };
            let outcome = run_phase(ctx, invocation, key, &template, options)?;
            let text = if invocation.json { to_json(&outcome)? } else { phase_summary(&outcome) };
            if outcome.state == RunState::Aborted {
                println!("{text}");
                return Err(format!(
                    "phase {key} aborted: {}",
                    outcome.cause.as_deref().unwrap_or("unknown cause")
                ));
            }
            Ok(text)
        }
    }
}

fn show_one(ctx: &ServiceContext, invocation: &Invocation, key: &str) -> Result<String, String> {
    let consumed = invocation.state_store(ctx).load(key);
    if invocation.json {
        return to_json(&consumed);
    }
    let mut lines: Vec<String> = consumed.iter().cloned().collect();
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!("{} path(s) consumed in phase {key}.", consumed.len()));
    Ok(lines.join("\n"))
}

fn show_all(ctx: &ServiceContext, invocation: &Invocation) -> Result<String, String> {
    let rows: Vec<PhaseSummary> = invocation
        .state_store(ctx)
        .phases()
        .into_iter()
        .map(|(phase, record)| PhaseSummary {
            phase,
            consumed: record.consumed.len(),
            updated_at: record.updated_at.to_rfc3339(),
        })
        .collect();
    if invocation.json {
        return to_json(&rows);
    }
    if rows.is_empty() {
        return Ok("No phase progress recorded.".to_string());
    }

    let phase_width = rows.iter().map(|r| r.phase.len()).max().unwrap_or(5).max(5);
    let mut lines = vec![
        format!("{:<phase_width$}  {:>8}  UPDATED", "PHASE", "CONSUMED"),
        format!("{:-<phase_width$}  {:->8}  -------", "", ""),
    ];
    for row in &rows {
        lines.push(format!(
            "{:<phase_width$}  {:>8}  {}",
            row.phase, row.consumed, row.updated_at
        ));
    }
    lines.push(format!("\n{} phase(s) recorded.", rows.len()));
    Ok(lines.join("\n"))
}

fn consume(
    ctx: &ServiceContext,
    invocation: &Invocation,
    key: &str,
    paths: &[String],
) -> Result<String, String> {
    let normalized = paths
        .iter()
        .map(|raw| mapping::normalize(raw).map(|p| mapping::to_source_path(&p)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    let consumed = invocation
        .state_store(ctx)
        .consume(key, normalized)
        .map_err(|e| e.to_string())?;
    Ok(format!("Phase {key}: {} path(s) consumed.", consumed.len()))
}

fn phase_candidates(
    ctx: &ServiceContext,
    invocation: &Invocation,
    key: &str,
) -> Result<Vec<SourceUnit>, String> {
    let manifest = Manifest::load(ctx, &Manifest::path_in(&invocation.state_dir()));
    cycle::candidates(&invocation.root, &invocation.collect_options(), manifest.as_ref(), key)
        .map_err(|e| e.to_string())
}

fn pending(
    ctx: &ServiceContext,
    invocation: &Invocation,
    key: &str,
    limit: Option<usize>,
) -> Result<String, String> {
    let candidates = phase_candidates(ctx, invocation, key)?;
    let consumed = invocation.state_store(ctx).load(key);
    let remaining = cycle::remaining(&candidates, &consumed);
    let shown: Vec<&str> = remaining
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|u| u.path.as_str())
        .collect();

    if invocation.json {
        let counts: BTreeMap<&str, usize> =
            [("candidates", candidates.len()), ("remaining", remaining.len())].into_iter().collect();
        return to_json(&serde_json::json!({ "counts": counts, "pending": shown }));
    }
    let mut lines: Vec<String> = shown.iter().map(|p| (*p).to_string()).collect();
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "{} of {} candidate(s) remaining in phase {key}.",
        remaining.len(),
        candidates.len()
    ));
    Ok(lines.join("\n"))
}

fn run_phase(
    ctx: &ServiceContext,
    invocation: &Invocation,
    key: &str,
    template: &str,
    options: PhaseOptions,
) -> Result<PhaseOutcome, String> {
    let candidates = phase_candidates(ctx, invocation, key)?;
    let store = ArtifactStore::new(ctx, &invocation.root);
    let state = invocation.state_store(ctx);
    let mut worker = ShellWorker::new(&store, template);
    cycle::run_phase(&store, &state, key, &candidates, &mut worker, options).map_err(|e| e.to_string())
}

fn phase_summary(outcome: &PhaseOutcome) -> String {
    let progress = format!(
        "{}/{} candidate(s) consumed, {} remaining",
        outcome.consumed, outcome.candidates, outcome.remaining
    );
    match outcome.state {
        RunState::Done => format!("Phase {} complete: {progress}.", outcome.phase),
        RunState::Suspended => {
            format!("Phase {} suspended: {progress}. Run again to resume.", outcome.phase)
        }
        _ => format!(
            "Phase {} stopped: {progress} ({}).",
            outcome.phase,
            outcome.cause.as_deref().unwrap_or("unknown cause")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::Path;

    fn invocation(root: &Path) -> Invocation {
        Invocation { root: root.to_path_buf(), config: Config::default(), json: false }
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.ts"), "a").unwrap();
        std::fs::write(dir.path().join("src/b.ts"), "b").unwrap();
        dir
    }

    #[test]
    fn consume_then_show_and_reset() {
        let dir = tree();
        let ctx = ServiceContext::live_in(dir.path());
        let inv = invocation(dir.path());

        let consume = PhaseAction::Consume { key: "1".into(), paths: vec!["./src/a.ts".into(), "src/b.ts.au".into()] };
        assert_eq!(render(&ctx, &inv, &consume).unwrap(), "Phase 1: 2 path(s) consumed.");

        let shown = render(&ctx, &inv, &PhaseAction::Show { key: Some("1".into()) }).unwrap();
        assert_eq!(shown, "src/a.ts\nsrc/b.ts\n\n2 path(s) consumed in phase 1.");

        let all = render(&ctx, &inv, &PhaseAction::Show { key: None }).unwrap();
        assert!(all.contains("1 phase(s) recorded."));

        let reset = PhaseAction::Reset { key: "1".into() };
        assert_eq!(render(&ctx, &inv, &reset).unwrap(), "Phase 1 reset.");
        assert_eq!(render(&ctx, &inv, &reset).unwrap(), "Phase 1 had no recorded progress.");
    }

    #[test]
    fn consume_rejects_escaping_paths() {
        let dir = tree();
        let ctx = ServiceContext::live_in(dir.path());
        let consume = PhaseAction::Consume { key: "1".into(), paths: vec!["../outside.ts".into()] };
        let err = render(&ctx, &invocation(dir.path()), &consume).unwrap_err();
        assert!(err.contains("escapes the source root"));
    }

    #[test]
    fn pending_skips_consumed_candidates() {
        let dir = tree();
        let ctx = ServiceContext::live_in(dir.path());
        let inv = invocation(dir.path());
        render(&ctx, &inv, &PhaseAction::Consume { key: "1".into(), paths: vec!["src/a.ts".into()] })
            .unwrap();

        let text = render(&ctx, &inv, &PhaseAction::Pending { key: "1".into(), limit: None }).unwrap();
        assert_eq!(text, "src\nsrc/b.ts\n.\n\n3 of 4 candidate(s) remaining in phase 1.");
    }

    #[test]
    fn manifest_narrows_phase_candidates() {
        let dir = tree();
        std::fs::create_dir_all(dir.path().join(".mirrordoc")).unwrap();
        std::fs::write(
            dir.path().join(".mirrordoc/manifest.yaml"),
            "phases:\n  2:\n    patterns: [\"src/b*\"]\n",
        )
        .unwrap();
        let ctx = ServiceContext::live_in(dir.path());
        let text = render(&ctx, &invocation(dir.path()), &PhaseAction::Pending { key: "2".into(), limit: Some(5) })
            .unwrap();
        assert_eq!(text, "src/b.ts\n\n1 of 1 candidate(s) remaining in phase 2.");
    }

    #[test]
    fn phase_run_consumes_with_shell_worker() {
        let dir = tree();
        let ctx = ServiceContext::live_in(dir.path());
        let run = PhaseAction::Run {
            key: "files".into(),
            worker_cmd: Some("printf 'summary: s\\n' > {artifact}".into()),
            max_iterations: None,
            batch: Some(2),
        };
        let text = render(&ctx, &invocation(dir.path()), &run).unwrap();
        assert_eq!(text, "Phase files complete: 4/4 candidate(s) consumed, 0 remaining.");
        assert!(dir.path().join("src/.au").exists());
        assert!(dir.path().join(".au").exists());
    }

    #[test]
    fn phase_run_without_artifacts_aborts() {
        let dir = tree();
        let ctx = ServiceContext::live_in(dir.path());
        let run = PhaseAction::Run {
            key: "1".into(),
            worker_cmd: Some("true".into()),
            max_iterations: None,
            batch: None,
        };
        let err = render(&ctx, &invocation(dir.path()), &run).unwrap_err();
        assert!(err.starts_with("phase 1 aborted: worker finished with 4 item(s) remaining"));
    }
}
