//! Watch command handler
//!
//! Runs a pass every `interval` minutes and whenever Enter is pressed.
//! Ctrl-C saves the state and exits.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::debug;

use ankisync_core::{Config, SyncError, SyncMode, Synchronizer};

use crate::output::Output;

pub async fn run(config: &Config, interval_minutes: Option<u64>, output: Output) -> Result<()> {
    let sync = Arc::new(Synchronizer::open(config).context("Failed to load sync state")?);

    let minutes = match interval_minutes {
        Some(minutes) => minutes,
        None => sync.settings().await.auto_sync,
    };
    let mut ticker = (minutes > 0).then(|| {
        let mut ticker = interval(Duration::from_secs(minutes * 60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    if minutes > 0 {
        output.message(&format!(
            "Watching {} (every {} min). Press Enter to sync now, Ctrl-C to stop.",
            config.vault_dir.display(),
            minutes
        ));
    } else {
        output.message(&format!(
            "Watching {}. Press Enter to sync, Ctrl-C to stop.",
            config.vault_dir.display()
        ));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = next_tick(&mut ticker) => {
                debug!("Scheduled sync");
                spawn_pass(&sync, output);
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => spawn_pass(&sync, output),
                Ok(None) => {
                    debug!("stdin closed, manual sync disabled");
                    stdin_open = false;
                }
                Err(e) => {
                    output.warning(&format!("Failed to read stdin: {}", e));
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    match sync.save().await {
        Ok(()) => output.success("Sync state saved"),
        // The other process commits its own state
        Err(SyncError::Busy) => output.message("Another sync is running; leaving the state to it"),
        Err(e) => return Err(e).context("Failed to save sync state"),
    }
    Ok(())
}

/// Resolves on the next tick, or never when periodic sync is off
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Run a pass in the background so input stays responsive
fn spawn_pass(sync: &Arc<Synchronizer>, output: Output) {
    let sync = Arc::clone(sync);
    tokio::spawn(async move {
        match sync.sync(SyncMode::Incremental).await {
            Ok(report) => output.print_report(&report),
            Err(SyncError::Busy) => output.message("A sync is already running"),
            Err(e) => output.warning(&format!("Sync failed: {}", e)),
        }
    });
}
