// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ShareVault Simulator
//!
//! Entry point for the `sharevault` binary. Parses CLI arguments, initializes
//! logging, builds a vault from a scenario file and replays it.
//!
//! The binary supports three subcommands:
//!
//! - `simulate` — run a scenario and print the JSON report
//! - `inspect`  — validate a scenario and print the vault it would build
//! - `version`  — print build version information

mod cli;
mod logging;
mod metrics;
mod scenario;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Commands, ShareVaultCli};
use logging::{LogFormat, DEFAULT_FILTER};
use metrics::SimMetrics;
use scenario::{Scenario, Simulator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ShareVaultCli::parse();

    match cli.command {
        Commands::Simulate(args) => simulate(args).await,
        Commands::Inspect(args) => inspect(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Runs a scenario end to end and writes the report.
async fn simulate(args: cli::SimulateArgs) -> Result<()> {
    logging::init_logging(DEFAULT_FILTER, LogFormat::from_str_lossy(&args.log_format));

    let scenario = Scenario::from_path(&args.scenario)
        .with_context(|| format!("failed to load scenario {}", args.scenario.display()))?;
    tracing::info!(
        path = %args.scenario.display(),
        steps = scenario.step_count(),
        "scenario loaded"
    );

    let mut simulator = Simulator::new(&scenario).context("failed to build vault")?;
    if args.metrics {
        simulator = simulator.with_metrics(SimMetrics::new());
    }

    let report = simulator
        .run(&scenario.steps, scenario.halt_on_error)
        .await
        .context("scenario run failed")?;
    let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Validates a scenario and prints the vault it describes.
fn inspect(args: cli::InspectArgs) -> Result<()> {
    logging::init_logging("sharevault_node=warn", LogFormat::Pretty);

    let scenario = Scenario::from_path(&args.scenario)
        .with_context(|| format!("failed to load scenario {}", args.scenario.display()))?;
    let simulator = Simulator::new(&scenario).context("failed to build vault")?;

    let summary = simulator.summary(&scenario);
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("failed to encode summary")?
    );
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("sharevault {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", sharevault_protocol::config::PROTOCOL_VERSION);
    println!("rustc      {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
