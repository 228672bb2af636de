mod cmd;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "crawler",
    about = "Scheduled crawl job: load the target registry, crawl every target concurrently, persist",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to the crawler config file
    #[arg(long, global = true, env = "CRAWLER_CONFIG", default_value = "crawler.yaml")]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log line format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one invocation: crawl every registry target and save the registry
    Run {
        /// Trigger payload (JSON); recorded in the trace, otherwise unused
        #[arg(long)]
        event: Option<String>,

        /// Registry file (overrides `registry_path` from the config)
        #[arg(long)]
        registry: Option<PathBuf>,
    },

    /// List the targets in the registry
    Targets {
        /// Registry file (overrides `registry_path` from the config)
        #[arg(long)]
        registry: Option<PathBuf>,
    },

    /// Validate config, build the index client, and ping the index
    Check,

    /// Inspect the config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } | Commands::Check => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into());
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }

    let config_path = cli.config.as_path();

    let result = match cli.command {
        Commands::Run { event, registry } => {
            cmd::run::run(config_path, registry.as_deref(), event.as_deref(), cli.json)
        }
        Commands::Targets { registry } => {
            cmd::targets::run(config_path, registry.as_deref(), cli.json)
        }
        Commands::Check => cmd::check::run(config_path, cli.json),
        Commands::Config { subcommand } => cmd::config::run(config_path, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
