//! Command implementations

mod config;
mod heights;
mod lineage;
mod project;

use crate::cli::{Cli, Commands};
use crate::config_loader::load_config_with_overrides;
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use geoweave_client::HttpBackend;
use geoweave_core::config::CliConfigOverrides;
use geoweave_core::models::SessionToken;
use geoweave_core::ports::{Backend, StaticSession};
use std::sync::Arc;
use tracing::debug;

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let config = load_config_with_overrides(
        cli.config.as_deref(),
        CliConfigOverrides {
            api_url: cli.api_url.clone(),
            ..Default::default()
        },
    )?;
    debug!(api_url = %config.api_url.value, "Loaded configuration");

    match cli.command {
        Commands::Lineage(args) => lineage::execute(args, &config, cli.token, &output).await,
        Commands::Heights(args) => heights::execute(args, &output),
        Commands::Project(args) => project::execute(args, &config, cli.token, &output).await,
        Commands::Config => config::execute(&config, &output),
    }
}

/// The API backend and a session for `token`
fn connect(api_url: &str, token: Option<String>) -> Result<(Arc<dyn Backend>, Arc<StaticSession>)> {
    let token = token.context("A session token is required, pass it with --token")?;
    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(api_url));
    let session = Arc::new(StaticSession::new(SessionToken::new(token)));
    Ok((backend, session))
}
