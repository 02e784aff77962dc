// src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Preset, SettleStrategy};

/// Scripted grading of student client/server executables.
///
/// `grader.yaml` is the primary source of truth.
/// CLI flags only override config values.
#[derive(Parser, Debug)]
#[command(
    name = "suitegrader",
    version,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// All supported CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Grade a suite against the configured executables.
    ///
    /// Prints a JSON summary to stdout. Logs go to stderr (RUST_LOG).
    Run {
        /// Suite folder (suite.yaml + one folder per test case)
        suite: PathBuf,

        /// Path to config file
        ///
        /// Defaults to ./grader.yaml when present
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override client executable
        #[arg(long)]
        client: Option<PathBuf>,

        /// Override server executable
        #[arg(long)]
        server: Option<PathBuf>,

        /// Override validation preset
        #[arg(long, value_enum)]
        preset: Option<Preset>,

        /// Write the full JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Read captured HTTP exchanges from this folder
        #[arg(long)]
        capture_dir: Option<PathBuf>,

        /// Override per-stage timeout in seconds
        #[arg(long)]
        stage_timeout: Option<u64>,

        /// Override process start timeout in seconds
        #[arg(long)]
        start_timeout: Option<u64>,

        /// Override settle strategy
        ///
        /// Allowed values: fixed | quiet
        #[arg(long, value_parser = ["fixed", "quiet"])]
        settle: Option<String>,

        /// Skip the database reset even if one is configured
        #[arg(long)]
        no_db_reset: bool,
    },

    /// Check a suite definition without running anything.
    ///
    /// Prints a JSON validation report and fails if any problem is found.
    Validate {
        /// Suite folder
        suite: PathBuf,

        /// Path to config file
        ///
        /// Defaults to ./grader.yaml when present
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override client executable
        #[arg(long)]
        client: Option<PathBuf>,

        /// Override server executable
        #[arg(long)]
        server: Option<PathBuf>,
    },
}

pub fn parse_settle(value: &str) -> SettleStrategy {
    match value {
        "quiet" => SettleStrategy::Quiet,
        _ => SettleStrategy::Fixed,
    }
}
