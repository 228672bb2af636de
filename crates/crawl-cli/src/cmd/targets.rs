use crate::output::{print_json, print_targets};
use anyhow::Context;
use crawl_core::{FileRegistryStore, InvocationContext, RegistryStore};
use std::path::Path;

pub fn run(config_path: &Path, registry: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path, registry)?;
    let rt = super::runtime()?;
    let registry = rt
        .block_on(FileRegistryStore.load(&InvocationContext::new(), &config.registry_path))
        .context("failed to read registry")?;

    if json {
        return print_json(&registry.crawlers);
    }
    if registry.is_empty() {
        println!("No targets in {}.", config.registry_path.display());
        return Ok(());
    }
    print_targets(&registry.crawlers);
    Ok(())
}
