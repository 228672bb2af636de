use crate::output::{print_json, print_report};
use anyhow::{anyhow, Context};
use crawl_core::{FileRegistryStore, Handler, HttpCrawler, IndexClient};
use std::path::Path;
use std::sync::Arc;

pub fn run(
    config_path: &Path,
    registry: Option<&Path>,
    event: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let event: serde_json::Value = match event {
        Some(raw) => serde_json::from_str(raw).context("--event is not valid JSON")?,
        None => serde_json::Value::Null,
    };

    // Process start: everything below is built once and shared by the
    // invocation. A failure here is a startup error.
    let config = super::load_config(config_path, registry)?;
    let client = IndexClient::new(&config.index)
        .map_err(|e| anyhow!("startup failed: could not construct index client: {e}"))?;
    let unit = HttpCrawler::new(&config.crawl)?;
    let handler = Handler::new(
        Arc::new(config),
        FileRegistryStore,
        Arc::new(unit),
        Arc::new(client),
    );

    let rt = super::runtime()?;
    let report = rt.block_on(async {
        let ctx = handler.new_context();
        let watcher = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; cancelling crawl units");
                watcher.cancel();
            }
        });
        handler.handle_in(ctx, event).await
    })?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(())
}
