//! Data models for ankisync
//!
//! Digests are the compact fingerprints persisted between passes; `Settings`
//! are the user preferences stored alongside them.

use serde::{Deserialize, Serialize};

/// Fingerprint of a note's last synchronized state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDigest {
    /// Anki deck the note lives in
    pub deck: String,
    /// Content hash of (deck, basename, raw document text)
    pub hash: String,
}

/// Mirror of one Anki note type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteTypeDigest {
    /// Note type name
    pub name: String,
    /// Field names in template order
    pub field_names: Vec<String>,
}

/// User preferences persisted with the sync state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Wrap the note title as a `[[link]]` back to the document
    #[serde(default = "default_linkify")]
    pub linkify: bool,

    /// Minutes between automatic passes in `watch` (0 = off)
    #[serde(default)]
    pub auto_sync: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            linkify: default_linkify(),
            auto_sync: 0,
        }
    }
}

fn default_linkify() -> bool {
    true
}
