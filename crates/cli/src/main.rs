//! labkit CLI entry point

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod args;
mod commands;
mod config;

use args::{Cli, Commands};
use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; the flag wins over the config file. A config that
    // fails to load only falls back to "info" here; the command reports it.
    let log_level = cli.log_level.clone().unwrap_or_else(|| {
        AppConfig::load(cli.config.as_deref())
            .map(|config| config.general.log_level)
            .unwrap_or_else(|_| "info".to_string())
    });
    init_logging(&log_level)?;

    // Execute command
    match cli.command {
        Commands::Hash(args) => commands::hash::execute(args, cli.config).await,
        Commands::Duration(args) => commands::duration::execute(args).await,
        Commands::Bench(args) => commands::bench::execute(args, cli.config).await,
        Commands::Size(args) => commands::size::execute(args).await,
        Commands::About(args) => commands::about::execute(args, cli.config).await,
        Commands::Config(args) => commands::config::execute(args, cli.config).await,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}
