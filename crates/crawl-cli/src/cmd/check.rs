use crate::output::print_json;
use anyhow::anyhow;
use crawl_core::config::WarnLevel;
use crawl_core::IndexClient;
use std::path::Path;

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path, None)?;
    let warnings = config.validate();
    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        if json {
            print_json(&serde_json::json!({ "warnings": warnings }))?;
        }
        anyhow::bail!("config validation found errors; run `crawler config validate`");
    }

    let client = IndexClient::new(&config.index)
        .map_err(|e| anyhow!("could not construct index client: {e}"))?;
    let rt = super::runtime()?;
    let ping = rt.block_on(client.ping());

    if json {
        print_json(&serde_json::json!({
            "endpoint": client.endpoint(),
            "index": client.index(),
            "registry_path": config.registry_path,
            "reachable": ping.is_ok(),
            "error": ping.as_ref().err().map(|e| e.to_string()),
            "warnings": warnings,
        }))?;
    } else {
        println!("Index endpoint:  {}", client.endpoint());
        println!("Index:           {}", client.index());
        println!("Registry:        {}", config.registry_path.display());
        for w in &warnings {
            println!("[warning] {}", w.message);
        }
    }

    ping.map_err(|e| anyhow!("index at {} is not reachable: {e}", client.endpoint()))?;
    if !json {
        println!("Index is reachable.");
    }
    Ok(())
}
