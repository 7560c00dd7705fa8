//! ankisync CLI
//!
//! Command-line interface for ankisync - markdown notes mirrored into Anki.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ankisync_core::{Config, StorageError, SyncError};

mod commands;
mod logging;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "ankisync")]
#[command(about = "ankisync - Mirror markdown notes into Anki")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file (overrides default location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push the vault to Anki
    Sync {
        /// Push every note, ignoring the change cache
        #[arg(long)]
        full: bool,
    },
    /// Import note types from Anki as templates
    Import,
    /// Keep syncing: periodically, and whenever Enter is pressed
    Watch {
        /// Minutes between passes (defaults to the auto_sync setting)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Show status (vault, Anki connection, sync state)
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (vault_dir, vault_name, data_dir, anki_url,
        /// templates_dir, log_file, linkify, auto_sync)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands must work even with a broken vault setup
    if let Commands::Config { command } = &cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key.clone(), value.clone(), config_path, &output)
            }
        };
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    logging::init(&config, matches!(cli.command, Commands::Watch { .. }));

    let result = match cli.command {
        Commands::Sync { full } => commands::sync::run(&config, full, &output).await,
        Commands::Import => commands::import::run(&config, &output).await,
        Commands::Watch { interval } => commands::watch::run(&config, interval, output).await,
        Commands::Status => commands::status::show(&config, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    };

    if let Err(ref e) = result {
        if let Some(hint) = storage_hint(e) {
            output.warning(hint);
        }
    }
    result
}

/// Recovery hint for a failure rooted in the vault or state file
fn storage_hint(error: &anyhow::Error) -> Option<&'static str> {
    error.chain().find_map(|cause| {
        if let Some(SyncError::Storage(storage)) = cause.downcast_ref::<SyncError>() {
            return storage.recovery_suggestion();
        }
        cause
            .downcast_ref::<StorageError>()
            .and_then(StorageError::recovery_suggestion)
    })
}
