use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Budgeted background task runner.
///
/// Reads a TOML manifest of shell tasks, ranks them by priority against
/// their learned cost, and runs whatever fits the time budget.
#[derive(Parser, Debug)]
#[command(name = "nightshift", about = "Budgeted background task runner")]
pub struct CliArgs {
    /// Path to the task manifest
    #[arg(long, short, default_value = "nightshift.toml", env = "NIGHTSHIFT_MANIFEST")]
    pub manifest: PathBuf,

    /// Maximum concurrent tasks, overriding manifest and env (0 = available parallelism)
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Keep cost history in memory only
    #[arg(long)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one budgeted pass over every manifest task
    Run {
        /// Time budget in seconds granted by the host
        #[arg(long, default_value_t = 30.0)]
        budget: f64,
    },
    /// Run a single manifest task immediately, bypassing admission
    Now {
        /// Task id from the manifest
        task_id: String,
    },
    /// Print the current cost estimate of every manifest task
    Estimate,
    /// Forget all learned cost history
    Reset,
}
