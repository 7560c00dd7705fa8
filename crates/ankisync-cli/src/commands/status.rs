//! Status command handler

use anyhow::{Context, Result};

use ankisync_core::{AnkiClient, Config, Synchronizer};

use crate::output::{Output, OutputFormat};

/// Show status information
pub async fn show(config: &Config, output: &Output) -> Result<()> {
    let sync = Synchronizer::open(config).context("Failed to load sync state")?;
    let state = sync.state().await;
    let vault_exists = sync.vault().root().is_dir();
    let anki_version = sync.client().version().await.ok();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "vault_dir": config.vault_dir,
                    "vault_exists": vault_exists,
                    "vault_name": config.effective_vault_name(),
                    "anki_url": config.anki_url,
                    "anki_reachable": anki_version.is_some(),
                    "anki_version": anki_version,
                    "state_version": state.version,
                    "settings": state.settings,
                    "counts": {
                        "notes": state.note_state.len(),
                        "note_types": state.note_type_state.len()
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", if anki_version.is_some() { "up" } else { "down" });
        }
        OutputFormat::Human => {
            println!("ankisync Status");
            println!("===============");
            println!();
            println!("Vault:");
            println!("  Location: {}", config.vault_dir.display());
            println!("  Name:     {}", config.effective_vault_name());
            if !vault_exists {
                println!("  (directory not found)");
            }
            if let Some(dir) = sync.templates_dir() {
                println!("  Templates: {}", dir.display());
            }
            println!();
            println!("Anki:");
            println!("  URL:    {}", config.anki_url);
            match anki_version {
                Some(version) => println!("  Status: connected (AnkiConnect v{})", version),
                None => println!("  Status: unreachable"),
            }
            println!();
            println!("Settings:");
            println!("  linkify:   {}", state.settings.linkify);
            println!(
                "  auto_sync: {}",
                if state.settings.auto_sync == 0 {
                    "off".to_string()
                } else {
                    format!("every {} min", state.settings.auto_sync)
                }
            );
            println!();
            println!("Contents:");
            println!("  Notes:      {}", state.note_state.len());
            println!("  Note types: {}", state.note_type_state.len());
        }
    }

    Ok(())
}
