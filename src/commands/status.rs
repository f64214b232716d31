//! `mirrordoc status` command.

use super::{to_json, Invocation};
use crate::context::ServiceContext;
use crate::coverage;

/// Execute the `status` command.
///
/// Prints the coverage report, or the whole snapshot as JSON.
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
        to_json(&snapshot)
    } else {
        Ok(coverage::format_report(&snapshot))
    }
}
