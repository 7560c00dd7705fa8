//! Sync command handler

use anyhow::{Context, Result};

use ankisync_core::{Config, SyncMode, Synchronizer};

use crate::output::Output;

/// Push the vault to Anki once
pub async fn run(config: &Config, full: bool, output: &Output) -> Result<()> {
    let sync = Synchronizer::open(config).context("Failed to load sync state")?;
    let mode = if full {
        SyncMode::Full
    } else {
        SyncMode::Incremental
    };

    if !output.is_json() {
        output.message(&format!(
            "Syncing {} to {}...",
            config.vault_dir.display(),
            config.anki_url
        ));
    }

    let report = sync.sync(mode).await?;
    output.print_report(&report);
    Ok(())
}
