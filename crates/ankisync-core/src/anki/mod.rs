//! AnkiConnect access
//!
//! Anki exposes a local HTTP automation interface (AnkiConnect, default
//! `http://127.0.0.1:8765`). Requests are JSON envelopes:
//!
//! ```text
//! {"action": "deckNames", "version": 6, "params": {...}}
//! -> {"result": [...], "error": null}
//! ```
//!
//! A non-null `error` is a store-side failure and comes back as
//! `AnkiError::Store`; it is local to the call that produced it. Transport and
//! decoding failures mean the store is unreachable.

mod client;
mod message;
#[cfg(test)]
pub(crate) mod mock;

pub use client::{AnkiClient, AnkiError, AnkiResult, HttpAnkiClient};
pub use message::{AnkiNote, NoteInfo, StoreMedia, API_VERSION};
