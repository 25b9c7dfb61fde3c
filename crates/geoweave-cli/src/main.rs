//! Geoweave CLI - Command-line interface
//!
//! Renders workflow lineage, computes the map layout and inspects the
//! stored project and configuration.

mod cli;
mod commands;
mod config_loader;
mod output;
mod output_types;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

fn main() -> Result<()> {
    // Logs go to stderr so that JSON and SVG output stay parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async { commands::execute(cli).await })?;

    Ok(())
}
