//! `mirrordoc issues` command.

use serde::Serialize;

use super::{to_json, Invocation};
use crate::context::ServiceContext;
use crate::coverage::{self, CoverageSnapshot};
use crate::validate::{ContentsIssue, IncompleteFile, ParseIssue, StaleFile, StaleReference};

/// Issue buckets of a snapshot, without the unit lists.
#[derive(Debug, Serialize)]
struct IssueReport<'a> {
    stale_files: &'a [StaleFile],
    incomplete_files: &'a [IncompleteFile],
    parse_errors: &'a [ParseIssue],
    stale_references: &'a [StaleReference],
    contents_issues: &'a [ContentsIssue],
    orphaned_artifacts: &'a [String],
}

impl<'a> From<&'a CoverageSnapshot> for IssueReport<'a> {
    fn from(snapshot: &'a CoverageSnapshot) -> Self {
        Self {
            stale_files: &snapshot.stale_files,
            incomplete_files: &snapshot.incomplete_files,
            parse_errors: &snapshot.parse_errors,
            stale_references: &snapshot.stale_references,
            contents_issues: &snapshot.contents_issues,
            orphaned_artifacts: &snapshot.orphaned_artifacts,
        }
    }
}

/// Execute the `issues` command.
///
/// # Errors
///
/// Returns an error string if the source root cannot be scanned.
pub fn run_with_context(ctx: &ServiceContext, invocation: &Invocation) -> Result<(), String> {
    println!("{}", render(ctx, invocation)?);
    Ok(())
}

fn render(ctx: &ServiceContext, invocation: &Invocation) -> Result<String, String> {
    let snapshot = invocation.snapshot(ctx)?;
    if invocation.json {
        return to_json(&IssueReport::from(&snapshot));
    }
    let lines = coverage::issue_lines(&snapshot);
    if lines.is_empty() {
        return Ok("No issues.".to_string());
    }
    Ok(format!("{}\n\n{} issue(s).", lines.join("\n"), lines.len()))
}
