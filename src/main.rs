// src/main.rs

//! suitegrader
//!
//! Entry point for the suitegrader CLI. Parses arguments, installs logging
//! and hands off to the runner. There is no grading logic here.

use anyhow::Result;
use clap::Parser;
use suitegrader::{cli, runner};
use tracing_subscriber::EnvFilter;

/// Program entry point.
///
/// Uses Tokio because student processes are supervised asynchronously.
#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved for the JSON summary
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    runner::run(cli).await
}
