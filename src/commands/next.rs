//! `mirrordoc next` command.

use std::collections::HashMap;

use serde::Serialize;

use super::{to_json, Invocation};
use crate::context::ServiceContext;
use crate::progress::ProgressTracker;
use crate::scan::SourceUnit;

#[derive(Debug, Serialize)]
struct NextItem<'a> {
    path: &'a str,
    artifact: String,
}

/// Execute the `next` command.
///
/// Lists up to `limit` undocumented units in scan order with their artifact
/// paths.
///
/// # Errors
///
/// Returns an error string if the source root cannot be scanned.
pub fn run_with_context(
    ctx: &ServiceContext,
    invocation: &Invocation,
    limit: usize,
) -> Result<(), String> {
    println!("{}", render(ctx, invocation, limit)?);
    Ok(())
}

fn render(ctx: &ServiceContext, invocation: &Invocation, limit: usize) -> Result<String, String> {
    let snapshot = invocation.snapshot(ctx)?;
    let tracker = ProgressTracker::from_snapshot(&snapshot);
    let units: HashMap<&str, &SourceUnit> =
        snapshot.items.iter().map(|u| (u.path.as_str(), u)).collect();
    let items: Vec<NextItem<'_>> = tracker
        .pending_items(limit)
        .into_iter()
        .filter_map(|path| units.get(path).map(|unit| NextItem { path, artifact: unit.artifact_path() }))
        .collect();

    if invocation.json {
        return to_json(&items);
    }
    if items.is_empty() {
        return Ok("Nothing pending.".to_string());
    }
    let width = items.iter().map(|i| i.path.len()).max().unwrap_or(4).max(4);
    let mut lines = vec![format!("{:<width$}  ARTIFACT", "PATH"), format!("{:-<width$}  --------", "")];
    for item in &items {
        lines.push(format!("{:<width$}  {}", item.path, item.artifact));
    }
    let counts = tracker.counts();
    lines.push(format!("\n{} of {} pending unit(s) shown.", items.len(), counts.pending));
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ctx() -> ServiceContext {
        ServiceContext::with_fs(crate::adapters::live::filesystem::LiveFileSystem, Utc::now())
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/lib")).unwrap();
        std::fs::write(dir.path().join("src/index.ts"), "x").unwrap();
        std::fs::write(dir.path().join("src/lib/util.ts"), "y").unwrap();
        std::fs::write(dir.path().join("src/index.ts.au"), "summary: s\n").unwrap();
        dir
    }

    #[test]
    fn lists_pending_in_scan_order_with_limit() {
        let dir = tree();
        let text = render(&ctx(), &Invocation::with_root(dir.path()), 2).unwrap();
        assert!(text.contains("src      src/.au"));
        assert!(text.contains("src/lib  src/lib/.au"));
        assert!(!text.contains("util.ts"));
        assert!(text.contains("2 of 4 pending unit(s) shown."));
    }

    #[test]
    fn json_lists_paths_and_artifacts() {
        let dir = tree();
        let mut invocation = Invocation::with_root(dir.path());
        invocation.json = true;
        let value: serde_json::Value =
            serde_json::from_str(&render(&ctx(), &invocation, 10).unwrap()).unwrap();
        let paths: Vec<&str> =
            value.as_array().unwrap().iter().map(|v| v["path"].as_str().unwrap()).collect();
        assert_eq!(paths, vec!["src", "src/lib", "src/lib/util.ts", "."]);
        assert_eq!(value[3]["artifact"], ".au");
    }

    #[test]
    fn extensionless_files_list_sibling_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Makefile"), "all:").unwrap();
        let mut invocation = Invocation::with_root(dir.path());
        invocation.json = true;
        let value: serde_json::Value =
            serde_json::from_str(&render(&ctx(), &invocation, 10).unwrap()).unwrap();
        assert_eq!(value[0]["path"], "Makefile");
        assert_eq!(value[0]["artifact"], "Makefile.au");
    }

    #[test]
    fn empty_tree_has_nothing_pending() {
        let dir = tempfile::tempdir().unwrap();
        let text = render(&ctx(), &Invocation::with_root(dir.path()), 5).unwrap();
        assert_eq!(text, "Nothing pending.");
    }
}
