use crate::output::print_json;
use clap::Subcommand;
use crawl_core::config::{ConfigWarning, WarnLevel};
use crawl_core::{FileRegistryStore, InvocationContext, RegistryStore};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective config (file values plus environment overrides)
    Show,

    /// Validate the config and check that the registry loads
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(config_path: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(config_path, json),
        ConfigSubcommand::Validate => validate(config_path, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path, None)?;
    redact(&mut config);
    if json {
        return print_json(&config);
    }
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

fn redact(config: &mut crawl_core::config::Config) {
    use crawl_core::config::IndexAuth;
    match &mut config.index.auth {
        IndexAuth::Basic { password, .. } => *password = "***".into(),
        IndexAuth::ApiKey { key } => *key = "***".into(),
        IndexAuth::None => {}
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path, None)?;
    let mut warnings = config.validate();
    let registry = registry_state(&config.registry_path)?;
    match &registry {
        RegistryState::Missing => warnings.push(ConfigWarning {
            level: WarnLevel::Warning,
            message: format!(
                "registry {} does not exist; `crawler run` fails until it is created",
                config.registry_path.display()
            ),
        }),
        RegistryState::Unreadable(reason) => warnings.push(ConfigWarning {
            level: WarnLevel::Error,
            message: reason.clone(),
        }),
        RegistryState::Loaded(_) => {}
    }
    let errors = warnings
        .iter()
        .filter(|w| w.level == WarnLevel::Error)
        .count();

    if json {
        print_json(&serde_json::json!({
            "config": config_path,
            "registry_path": config.registry_path,
            "targets": match registry {
                RegistryState::Loaded(n) => Some(n),
                _ => None,
            },
            "valid": errors == 0,
            "warnings": warnings,
        }))?;
    } else {
        println!("Config:   {}", config_path.display());
        let targets = match registry {
            RegistryState::Loaded(n) => format!("{n} targets"),
            RegistryState::Missing => "missing".to_string(),
            RegistryState::Unreadable(_) => "unreadable".to_string(),
        };
        println!("Registry: {} ({targets})", config.registry_path.display());
        println!("Index:    {}/{}", config.index.endpoint, config.index.index);
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
        if errors == 0 {
            println!("Config is valid.");
        }
    }

    if errors > 0 {
        anyhow::bail!("config validation found {errors} error(s)");
    }
    Ok(())
}

enum RegistryState {
    Missing,
    Unreadable(String),
    Loaded(usize),
}

/// Load the registry the way `crawler run` would, without crawling.
fn registry_state(path: &Path) -> anyhow::Result<RegistryState> {
    if !path.exists() {
        return Ok(RegistryState::Missing);
    }
    let rt = super::runtime()?;
    let loaded = rt.block_on(FileRegistryStore.load(&InvocationContext::new(), path));
    Ok(match loaded {
        Ok(registry) => RegistryState::Loaded(registry.len()),
        Err(e) => RegistryState::Unreadable(e.to_string()),
    })
}
