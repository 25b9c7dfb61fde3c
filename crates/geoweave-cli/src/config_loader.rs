//! Configuration loading utilities for CLI commands

use anyhow::{Context, Result};
use geoweave_core::config::{CliConfigOverrides, LayeredConfig};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "geoweave.toml";

/// Load layered configuration, reading `path` or the default file if it exists
pub fn load_config(path: Option<&Path>) -> Result<LayeredConfig> {
    let config = LayeredConfig::with_defaults();

    let config = match config_file(path) {
        Some(path) => config
            .load_from_file(&path)
            .with_context(|| format!("Failed to load configuration file {}", path.display()))?,
        None => config,
    };

    Ok(config.load_from_env())
}

/// Load layered configuration with CLI overrides
pub fn load_config_with_overrides(
    path: Option<&Path>,
    overrides: CliConfigOverrides,
) -> Result<LayeredConfig> {
    let mut config = load_config(path)?;
    config.update_from_cli(overrides);
    Ok(config)
}

fn config_file(path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = path {
        return Some(path.to_path_buf());
    }
    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.is_file().then_some(default)
}
