pub mod check;
pub mod config;
pub mod run;
pub mod targets;

use anyhow::Context;
use crawl_core::config::Config;
use std::path::Path;

/// Load the config file and apply a `--registry` override.
pub fn load_config(path: &Path, registry: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::load(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    if let Some(registry) = registry {
        config.registry_path = registry.to_path_buf();
    }
    Ok(config)
}

pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start tokio runtime")
}
