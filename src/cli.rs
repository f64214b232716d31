//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI parser for `mirrordoc`.
#[derive(Debug, Parser)]
#[command(name = "mirrordoc", version, about = "Track and drive documentation coverage of a source tree")]
pub struct Cli {
    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Flags accepted before or after any subcommand.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Source root to work on.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,
    /// Include glob; repeat for several. Defaults to every file.
    #[arg(long = "include", global = true, value_name = "GLOB")]
    pub include: Vec<String>,
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show coverage and every open issue.
    Status,
    /// List the next pending units.
    Next {
        /// Maximum number of units to list.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List issues only.
    Issues,
    /// Drive the worker command until nothing is left to do.
    Run {
        /// Shell command run per unit; `{path}` and `{artifact}` are substituted.
        #[arg(long)]
        worker_cmd: Option<String>,
        /// Stop after this many worker turns.
        ///
        /// Without a cap the run continues as long as each full pass changes
        /// the pending units or the reported issues. A worker whose passes
        /// keep changing them without resolving them runs until interrupted.
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Units per worker turn.
        #[arg(long)]
        batch: Option<usize>,
        /// Delete every artifact and the cycle state before starting.
        #[arg(long)]
        purge: bool,
    },
    /// Inspect or edit per-phase progress.
    Phase {
        /// Phase action.
        #[command(subcommand)]
        action: PhaseAction,
    },
    /// Maintain the phase manifest.
    Manifest {
        /// Manifest action.
        #[command(subcommand)]
        action: ManifestAction,
    },
}

/// `phase` subcommands.
#[derive(Debug, Subcommand)]
pub enum PhaseAction {
    /// Show consumed paths of one phase, or a summary of all phases.
    Show {
        /// Phase key.
        key: Option<String>,
    },
    /// Mark paths consumed in a phase.
    Consume {
        /// Phase key.
        key: String,
        /// Source paths to mark.
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Forget the progress of a phase.
    Reset {
        /// Phase key.
        key: String,
    },
    /// List candidates of a phase not yet consumed.
    Pending {
        /// Phase key.
        key: String,
        /// Maximum number of paths to list.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Feed the unconsumed candidates of a phase to the worker command.
    Run {
        /// Phase key.
        key: String,
        /// Shell command run per unit; `{path}` and `{artifact}` are substituted.
        #[arg(long)]
        worker_cmd: Option<String>,
        /// Stop after this many worker turns.
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Units per worker turn.
        #[arg(long)]
        batch: Option<usize>,
    },
}

/// `manifest` subcommands.
#[derive(Debug, Subcommand)]
pub enum ManifestAction {
    /// Recompute statistics and per-phase outputs.
    Sync,
    /// Print the manifest.
    Show,
}
