//! Config command handlers
//!
//! Config keys live in the config file; `linkify` and `auto_sync` are
//! settings kept in the sync state file.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use ankisync_core::{Config, PassLock, Settings, StatePersistence};

use crate::output::{Output, OutputFormat};

const CONFIG_KEYS: &str = "vault_dir, vault_name, data_dir, anki_url, templates_dir, log_file";
const SETTING_KEYS: &str = "linkify, auto_sync";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    let settings = StatePersistence::new(config.state_path())
        .load()
        .map(|state| state.settings)
        .unwrap_or_default();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "vault_dir": config.vault_dir,
                    "vault_name": config.vault_name,
                    "data_dir": config.data_dir,
                    "anki_url": config.anki_url,
                    "templates_dir": config.templates_dir,
                    "log_file": config.log_file,
                    "linkify": settings.linkify,
                    "auto_sync": settings.auto_sync
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.vault_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  vault_dir:     {}", config.vault_dir.display());
            println!(
                "  vault_name:    {}",
                config.vault_name.as_deref().unwrap_or("(folder name)")
            );
            println!("  data_dir:      {}", config.data_dir.display());
            println!("  anki_url:      {}", config.anki_url);
            println!("  templates_dir: {}", display_path(&config.templates_dir));
            println!("  log_file:      {}", display_path(&config.log_file));
            println!();
            println!("Settings:");
            println!("  linkify:       {}", settings.linkify);
            println!("  auto_sync:     {}", settings.auto_sync);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value or setting
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    if apply_config(&mut config, &key, &value)? {
        // Save to the CLI-specified path or default
        let save_path = config_path
            .cloned()
            .unwrap_or_else(Config::config_file_path);
        config
            .save_to_path(&save_path)
            .context("Failed to save configuration")?;
    } else {
        // Held so a running pass can't commit over the change
        let _lock = PassLock::acquire(config.lock_path())
            .context("A sync is running; try again when it finishes")?;
        let persistence = StatePersistence::new(config.state_path());
        let mut state = persistence.load().context("Failed to load sync state")?;
        if !apply_setting(&mut state.settings, &key, &value)? {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: {}, {}",
                key,
                CONFIG_KEYS,
                SETTING_KEYS
            );
        }
        persistence.save(&state).context("Failed to save sync state")?;
    }

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Apply a config file key; false when `key` isn't one
fn apply_config(config: &mut Config, key: &str, value: &str) -> Result<bool> {
    match key {
        "vault_dir" => config.vault_dir = value.into(),
        "vault_name" => config.vault_name = optional(value),
        "data_dir" => config.data_dir = value.into(),
        "anki_url" => {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                bail!("Invalid value for anki_url. Use an http:// or https:// URL.");
            }
            config.anki_url = value.to_string();
        }
        "templates_dir" => config.templates_dir = optional(value).map(PathBuf::from),
        "log_file" => config.log_file = optional(value).map(PathBuf::from),
        _ => return Ok(false),
    }
    Ok(true)
}

/// Apply a settings key; false when `key` isn't one
fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> Result<bool> {
    match key {
        "linkify" => {
            settings.linkify = value
                .parse()
                .context("Invalid value for linkify. Use 'true' or 'false'.")?;
        }
        "auto_sync" => {
            settings.auto_sync = value
                .parse()
                .context("Invalid value for auto_sync. Use a number of minutes (0 = off).")?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Empty or "none" clears an optional value
fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}
