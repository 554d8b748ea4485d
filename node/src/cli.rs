//! # CLI Interface
//!
//! Defines the command-line argument structure for `sharevault` using
//! `clap` derive. Supports three subcommands: `simulate`, `inspect`, and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ShareVault scenario simulator.
///
/// Builds a vault over an in-memory asset ledger, replays a JSON scenario
/// of deposits, mints, withdrawals, redemptions and market moves against
/// it, and prints a JSON report of every outcome and the final books.
#[derive(Parser, Debug)]
#[command(
    name = "sharevault",
    about = "ShareVault scenario simulator",
    version,
    propagate_version = true
)]
pub struct ShareVaultCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the simulator binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario and print its report to stdout.
    Simulate(SimulateArgs),
    /// Validate a scenario and print the vault it would build, without
    /// running any steps.
    Inspect(InspectArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `simulate` subcommand.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Path to the scenario file (JSON).
    #[arg(long, short = 's', env = "SHAREVAULT_SCENARIO")]
    pub scenario: PathBuf,

    /// Log output format: `pretty` or `json`. Logs go to stderr.
    #[arg(long, env = "SHAREVAULT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Append the Prometheus text exposition of the run's metrics to the
    /// report.
    #[arg(long)]
    pub metrics: bool,

    /// Write the report to this file instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Arguments for the `inspect` subcommand.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Path to the scenario file (JSON).
    #[arg(long, short = 's', env = "SHAREVAULT_SCENARIO")]
    pub scenario: PathBuf,
}
