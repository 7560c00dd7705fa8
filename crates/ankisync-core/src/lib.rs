//! ankisync Core Library
//!
//! This crate provides the core functionality for ankisync, which keeps a
//! vault of markdown notes mirrored into Anki flashcards through the
//! AnkiConnect add-on.
//!
//! # Architecture
//!
//! - **Vault**: source of truth; one document per note
//! - **Digests**: per-note fingerprints persisted between passes, so
//!   unchanged documents cost nothing
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let sync = Synchronizer::open(&config)?;
//!
//! // Mirror Anki's note types into templates
//! sync.import_note_types().await?;
//!
//! // Push the vault
//! let report = sync.sync(SyncMode::Incremental).await?;
//! ```
//!
//! # Modules
//!
//! - `sync`: passes and imports (main entry point)
//! - `note`: document → note building and serialization
//! - `state`: digest stores and reconciliation
//! - `vault`: markdown document access
//! - `anki`: AnkiConnect client
//! - `storage`: state file persistence
//! - `config`: application configuration

pub mod anki;
pub mod config;
pub mod models;
pub mod note;
pub mod state;
pub mod storage;
pub mod sync;
pub mod vault;

pub use anki::{AnkiClient, AnkiError, HttpAnkiClient};
pub use config::Config;
pub use models::{NoteDigest, NoteTypeDigest, Settings};
pub use note::{Note, NoteBuilder, NoteError};
pub use state::{DigestStore, ReconcileOutcome, Reconciler};
pub use storage::{PassLock, StatePersistence, StorageError, SyncData};
pub use sync::{ImportReport, SyncError, SyncMode, SyncReport, Synchronizer};
pub use vault::{Document, Vault};
