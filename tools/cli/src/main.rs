//! sharehub - shared-directory service for a remote transfer collection.
//!
//! Loads one profile from the configuration file and serves the HTTP API,
//! or validates the profile and prints a summary.

mod config;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use sharehub_server::LogLevel;
use sharehub_share::ShareService;
use sharehub_transfer::{GlobusClient, OAuthBroker};

use config::Profile;

#[derive(Parser)]
#[command(name = "sharehub")]
#[command(about = "Shared-directory management over a remote transfer collection")]
#[command(version)]
struct Cli {
    /// Configuration file.
    #[arg(short = 'a', long, default_value = "config.toml")]
    config_file: PathBuf,

    /// Profile (table) within the configuration file.
    #[arg(short = 'c', long, default_value = "TEST")]
    config_profile: String,

    /// Force debug logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API (default).
    Serve,

    /// Validate the profile and print a summary.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let profile = config::load_profile(&cli.config_file, &cli.config_profile)
        .with_context(|| format!("Failed to load profile {}", cli.config_profile))?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => cmd_serve(profile, cli.verbose).await,
        Commands::CheckConfig => cmd_check_config(&profile),
    }
}

/// Run the API server.
async fn cmd_serve(profile: Profile, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { profile.log_level.as_str() };
    let filter = logging::init(level, profile.log_dir.as_deref())?;

    info!(collection = %profile.collection_id, "Starting sharehub");

    let transfer = GlobusClient::new(profile.globus_config())
        .context("Failed to build transfer client")?;
    let broker =
        OAuthBroker::new(profile.broker_config()).context("Failed to build credential broker")?;

    let service = ShareService::new(Arc::new(transfer), Arc::new(broker), profile.share_config());

    sharehub_server::run(profile.server_config(), service, Some(LogLevel::new(filter)))
        .await
        .context("Server failed")?;

    Ok(())
}

fn cmd_check_config(profile: &Profile) -> Result<()> {
    println!("Configuration OK");
    println!("{}", profile);
    Ok(())
}
