//! `mirrordoc manifest` commands.

use super::{to_json, Invocation};
use crate::artifact::ArtifactStore;
use crate::cli::ManifestAction;
use crate::context::ServiceContext;
use crate::cycle::{self, manifest::Manifest};

/// Execute a `manifest` subcommand.
///
/// # Errors
///
/// Returns an error string if no manifest exists, the tree cannot be
/// scanned, a pattern is invalid, or the manifest cannot be written.
pub fn run_with_context(
    ctx: &ServiceContext,
    invocation: &Invocation,
    action: &ManifestAction,
) -> Result<(), String> {
    println!("{}", render(ctx, invocation, action)?);
    Ok(())
}

fn render(
    ctx: &ServiceContext,
    invocation: &Invocation,
    action: &ManifestAction,
) -> Result<String, String> {
    let path = Manifest::path_in(&invocation.state_dir());
    let mut manifest = Manifest::load(ctx, &path)
        .ok_or_else(|| format!("no readable manifest at {}", path.display()))?;

    match action {
        ManifestAction::Show => {
            if invocation.json {
                to_json(&manifest)
            } else {
                serde_yaml::to_string(&manifest).map_err(|e| format!("failed to render manifest: {e}"))
            }
        }
        ManifestAction::Sync => {
            let units = cycle::candidates(&invocation.root, &invocation.collect_options(), None, "")
                .map_err(|e| e.to_string())?;
            let store = ArtifactStore::new(ctx, &invocation.root);
            let produced = manifest.sync_outputs(&store, &units).map_err(|e| e.to_string())?;
            manifest.save(ctx, &path).map_err(|e| e.to_string())?;

            if invocation.json {
                return to_json(&manifest.stats);
            }
            let stats = &manifest.stats;
            Ok(format!(
                "Manifest synced: {}/{} files assigned ({:.0}%), {produced} output artifact(s) across {} phase(s).",
                stats.assigned_files,
                stats.total_files,
                stats.coverage_ratio * 100.0,
                manifest.phases.len()
            ))
        }
    }
}
