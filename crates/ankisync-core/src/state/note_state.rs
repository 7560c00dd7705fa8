use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{info, warn};

use super::Reconciler;
use crate::anki::AnkiClient;
use crate::models::NoteDigest;

/// Deletes Anki notes whose document is gone
///
/// Notes processed during the pass were already pushed, so `apply` has
/// nothing left to do.
pub struct NoteEvictor<'a, C: AnkiClient + ?Sized> {
    client: &'a C,
    failures: Mutex<Vec<String>>,
}

impl<'a, C: AnkiClient + ?Sized> NoteEvictor<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Error messages from deletions Anki refused
    pub fn into_failures(self) -> Vec<String> {
        self.failures.into_inner().unwrap_or_default()
    }
}

#[async_trait]
impl<C: AnkiClient + ?Sized> Reconciler<NoteDigest> for NoteEvictor<'_, C> {
    async fn apply(&self, _id: i64, _value: &NoteDigest, _previous: Option<&NoteDigest>) -> bool {
        true
    }

    async fn evict(&self, id: i64, value: &NoteDigest) {
        match self.client.delete_notes(&[id]).await {
            Ok(()) => info!("Deleted note {} from deck {}", id, value.deck),
            Err(e) => {
                warn!("Failed to delete note {}: {}", id, e);
                if let Ok(mut failures) = self.failures.lock() {
                    failures.push(format!("Failed to delete note {}: {}", id, e));
                }
            }
        }
    }
}
