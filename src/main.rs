//! Kanhu CLI entry point.

use anyhow::Result;
use clap::Parser;
use kanhu::cli::{commands, Cli, Commands};
use kanhu::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // The server logs requests at info even without -v.
    let default_level = match (&cli.command, cli.verbose) {
        (Commands::Serve { .. }, 0) => "info",
        _ => log_level,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            format!("kanhu={0},tower_http={0}", default_level)
        })))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    match cli.command {
        Commands::Serve { host, port, rebuild } => {
            commands::run_serve(host, port, rebuild, settings).await?;
        }

        Commands::Index { force } => {
            commands::run_index(force, settings).await?;
        }

        Commands::Ask { question, voice, k } => {
            commands::run_ask(&question, voice, k, settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings, cli.config.as_deref()).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, cli.config.as_deref(), settings)?;
        }
    }

    Ok(())
}
