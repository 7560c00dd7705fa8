//! Vault → Anki synchronization
//!
//! ## Pass
//!
//! 1. Check Anki is reachable (`deckNames`); abort otherwise
//! 2. Scan the vault, pushing each managed document that changed
//! 3. Reconcile the note digests, deleting notes whose document is gone
//! 4. Save the state once
//!
//! ## Usage
//!
//! ```ignore
//! let sync = Synchronizer::open(&config)?;
//! let report = sync.sync(SyncMode::Incremental).await?;
//! report.log();
//! ```

mod import;
mod pass;
mod report;

pub use report::{ImportReport, SyncReport};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::anki::{AnkiClient, AnkiError, HttpAnkiClient};
use crate::config::Config;
use crate::models::Settings;
use crate::note::NoteBuilder;
use crate::state::{DigestStore, NoteEvictor};
use crate::storage::{PassLock, StatePersistence, StorageError, SyncData};
use crate::vault::Vault;
use pass::Pass;

/// Errors that stop a pass or an import as a whole
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Cannot reach Anki, is it running with AnkiConnect? ({0})")]
    Connectivity(#[source] AnkiError),

    #[error("Anki request failed: {0}")]
    Anki(#[source] AnkiError),

    #[error("{0}")]
    Precondition(String),

    #[error("A sync is already running")]
    Busy,

    #[error(transparent)]
    Storage(StorageError),
}

impl From<AnkiError> for SyncError {
    fn from(err: AnkiError) -> Self {
        if err.is_connectivity() {
            SyncError::Connectivity(err)
        } else {
            SyncError::Anki(err)
        }
    }
}

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Locked { .. } => SyncError::Busy,
            other => SyncError::Storage(other),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// How much a pass may trust the digest cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// Skip documents whose digest is unchanged
    #[default]
    Incremental,
    /// Push every managed document
    Full,
}

/// Runs passes and imports against one vault and one Anki
///
/// Only one pass or import runs at a time; a second caller gets
/// `SyncError::Busy`.
pub struct Synchronizer<C = HttpAnkiClient> {
    client: C,
    vault: Vault,
    vault_name: String,
    /// Vault-relative templates folder
    templates_dir: Option<PathBuf>,
    persistence: StatePersistence,
    lock_path: PathBuf,
    state: Mutex<SyncData>,
}

impl Synchronizer<HttpAnkiClient> {
    /// Open against the AnkiConnect endpoint from `config`
    pub fn open(config: &Config) -> SyncResult<Self> {
        Self::with_client(HttpAnkiClient::new(&config.anki_url), config)
    }
}

impl<C: AnkiClient> Synchronizer<C> {
    pub fn with_client(client: C, config: &Config) -> SyncResult<Self> {
        let persistence = StatePersistence::new(config.state_path());
        let state = persistence.load()?;
        let templates_dir = config
            .templates_dir
            .as_deref()
            .map(|dir| vault_relative(&config.vault_dir, dir));

        Ok(Self {
            client,
            vault: Vault::new(&config.vault_dir),
            vault_name: config.effective_vault_name(),
            templates_dir,
            persistence,
            lock_path: config.lock_path(),
            state: Mutex::new(state),
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub fn templates_dir(&self) -> Option<&Path> {
        self.templates_dir.as_deref()
    }

    /// Snapshot of the current state
    pub async fn state(&self) -> SyncData {
        self.state.lock().await.clone()
    }

    pub async fn settings(&self) -> Settings {
        self.state.lock().await.settings.clone()
    }

    /// Persist the state once any running pass or import has finished
    ///
    /// The file is reloaded under the pass lock before it is rewritten, so
    /// whatever another process committed meanwhile is kept.
    pub async fn save(&self) -> SyncResult<()> {
        let mut state = self.state.lock().await;
        let _lock = PassLock::acquire(&self.lock_path)?;
        self.reload(&mut state)?;
        self.persistence.save(&state)?;
        Ok(())
    }

    /// Replace the cached state with what's on disk
    ///
    /// Called with the pass lock held: another process may have committed
    /// since this one last looked.
    fn reload(&self, state: &mut SyncData) -> SyncResult<()> {
        *state = self.persistence.load()?;
        Ok(())
    }

    /// Run one pass over the vault
    pub async fn sync(&self, mode: SyncMode) -> SyncResult<SyncReport> {
        let mut state = self.state.try_lock().map_err(|_| SyncError::Busy)?;
        let _lock = PassLock::acquire(&self.lock_path)?;
        self.reload(&mut state)?;

        let decks: HashSet<String> = self
            .client
            .deck_names()
            .await
            .map_err(SyncError::Connectivity)?
            .into_iter()
            .collect();
        debug!("Anki reachable, {} decks", decks.len());

        let documents = self.vault.documents(self.templates_dir.as_deref())?;
        info!("Syncing {} documents ({:?})", documents.len(), mode);

        let note_types = DigestStore::from_map(state.note_type_state.clone());
        let mut note_state = DigestStore::from_map(std::mem::take(&mut state.note_state));

        let pass = Pass {
            client: &self.client,
            vault: &self.vault,
            vault_name: &self.vault_name,
            builder: NoteBuilder::new(&state.settings),
            mode,
            note_types: &note_types,
            previous: &note_state,
            decks,
        };
        let (working, mut report) = pass.run(documents).await;

        let evictor = NoteEvictor::new(&self.client);
        let outcome = note_state.reconcile(working, &evictor).await;
        report.deleted = outcome.evicted;
        for failure in evictor.into_failures() {
            report.error(failure);
        }

        state.note_state = note_state.into_map();
        self.persistence.save(&state)?;

        report.log();
        Ok(report)
    }
}

/// Express `dir` relative to the vault root when it lies inside it
fn vault_relative(vault_dir: &Path, dir: &Path) -> PathBuf {
    dir.strip_prefix(vault_dir).unwrap_or(dir).to_path_buf()
}
