//! Import command handler

use anyhow::{Context, Result};

use ankisync_core::{Config, Synchronizer};

use crate::output::Output;

/// Mirror Anki's note types into the templates folder
pub async fn run(config: &Config, output: &Output) -> Result<()> {
    let sync = Synchronizer::open(config).context("Failed to load sync state")?;
    let report = sync.import_note_types().await?;
    output.print_import(&report);

    if let Some(dir) = sync.templates_dir() {
        if !output.is_json() {
            output.message(&format!("Templates written to {}", dir.display()));
        }
    }
    Ok(())
}
