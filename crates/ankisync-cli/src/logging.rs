//! Logging setup
//!
//! Filter comes from `ANKISYNC_LOG` (e.g. `debug`, `ankisync_core=trace`).
//! Logs go to `log_file` when configured, stderr otherwise.

use std::fs::OpenOptions;
use std::sync::Mutex;

use ankisync_core::Config;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ANKISYNC_LOG";

/// Build the filter: `ANKISYNC_LOG` wins, otherwise `default_level` for our crates
fn env_filter(default_level: &str) -> EnvFilter {
    let directives = std::env::var(LOG_ENV).unwrap_or_else(|_| default_level.to_string());
    if directives.contains('=') {
        EnvFilter::new(directives)
    } else {
        EnvFilter::new(format!("ankisync_core={},ankisync={}", directives, directives))
    }
}

/// Install the global subscriber
///
/// `verbose` raises the default level from `warn` to `info` (used by `watch`).
pub fn init(config: &Config, verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    let filter = env_filter(level);

    if let Some(ref log_path) = config.log_file {
        let file = match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                return;
            }
        };

        // Ignore error if already initialized
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init();
        debug!("Logging to {:?}", log_path);
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
