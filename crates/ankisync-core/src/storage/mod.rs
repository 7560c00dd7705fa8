//! Storage layer
//!
//! Persists the sync state (settings plus both digest maps) and guards a pass
//! against concurrent processes.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::{PassLock, StatePersistence, SyncData, STATE_VERSION};
