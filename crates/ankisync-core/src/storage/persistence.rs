//! Sync state persistence
//!
//! The whole sync state lives in one JSON file, `state.json` in the data
//! directory:
//!
//! ```text
//! {
//!   "version": "0.3.0",
//!   "settings": { "linkify": true, "autoSync": 0 },
//!   "noteState": { "1699999999999": { "deck": "Spanish", "hash": "..." } },
//!   "noteTypeState": { "1": { "name": "Basic", "fieldNames": ["Front", "Back"] } }
//! }
//! ```
//!
//! Writes are atomic (write to temp file, then rename) so a crash never leaves
//! a half-written state file behind.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};
use crate::models::{NoteDigest, NoteTypeDigest, Settings};

/// Format version written into new state files
pub const STATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything persisted between passes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncData {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub note_state: BTreeMap<i64, NoteDigest>,
    #[serde(default)]
    pub note_type_state: BTreeMap<i64, NoteTypeDigest>,
}

impl Default for SyncData {
    fn default() -> Self {
        Self {
            version: default_version(),
            settings: Settings::default(),
            note_state: BTreeMap::new(),
            note_type_state: BTreeMap::new(),
        }
    }
}

fn default_version() -> String {
    STATE_VERSION.to_string()
}

/// Loads and saves `SyncData`
#[derive(Debug, Clone)]
pub struct StatePersistence {
    path: PathBuf,
}

impl StatePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the state, falling back to defaults when no file exists yet
    ///
    /// Missing keys are filled from defaults, so older files keep loading.
    pub fn load(&self) -> StorageResult<SyncData> {
        if !self.path.exists() {
            debug!("No state file at {:?}, starting fresh", self.path);
            return Ok(SyncData::default());
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| StorageError::from_read(e, self.path.clone()))?;
        let data: SyncData =
            serde_json::from_str(&json).map_err(|e| StorageError::InvalidFormat {
                path: self.path.clone(),
                details: e.to_string(),
            })?;

        if data.version != STATE_VERSION {
            debug!(
                "State file written by version {}, running {}",
                data.version, STATE_VERSION
            );
        }
        Ok(data)
    }

    /// Save the state, stamping the current format version
    pub fn save(&self, data: &SyncData) -> StorageResult<()> {
        let mut data = data.clone();
        data.version = STATE_VERSION.to_string();
        let json = serde_json::to_string_pretty(&data).map_err(|e| StorageError::InvalidFormat {
            path: self.path.clone(),
            details: e.to_string(),
        })?;
        atomic_write(&self.path, json.as_bytes())
    }
}

/// Held for the duration of a pass; excludes other processes
///
/// The lock file is created with `create_new` and removed on drop.
#[derive(Debug)]
pub struct PassLock {
    path: PathBuf,
}

impl PassLock {
    pub fn acquire(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::Locked { path })
            }
            Err(e) => Err(StorageError::from_io(e, path)),
        }
    }
}

impl Drop for PassLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {:?}: {}", self.path, e);
        }
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    // Temp file in the same directory so the rename stays atomic
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
