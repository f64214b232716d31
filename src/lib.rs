//! Core library entry for the `mirrordoc` CLI.
//!
//! `mirrordoc` keeps a tree of artifacts (structured notes, one per source
//! file and directory) in step with a source tree. It reports coverage and
//! staleness, tells a worker what to document next, and tracks multi-phase
//! progress so interrupted work resumes where it stopped.

pub mod adapters;
pub mod artifact;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod coverage;
pub mod cycle;
pub mod mapping;
pub mod ports;
pub mod progress;
pub mod run;
pub mod scan;
pub mod validate;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "MIRRORDOC_LOG";

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    init_tracing(cli.global.verbose);
    commands::dispatch(&cli.global, &cli.command)
}

/// Installs the stderr log subscriber.
///
/// The filter comes from `MIRRORDOC_LOG`, defaulting to `warn`; `verbose`
/// forces `debug`. Later calls are no-ops.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
