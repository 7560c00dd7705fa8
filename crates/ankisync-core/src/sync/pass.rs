//! One pass over the vault
//!
//! Documents are handled one at a time and independently; a failure on one
//! document is recorded in the report and never stops the others.

use std::collections::{BTreeMap, HashSet};

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use super::report::SyncReport;
use super::SyncMode;
use crate::anki::{AnkiClient, StoreMedia};
use crate::models::{NoteDigest, NoteTypeDigest};
use crate::note::{is_media, media_file_name, Note, NoteBuilder};
use crate::state::DigestStore;
use crate::vault::{Document, Vault};

pub(super) struct Pass<'a, C: AnkiClient + ?Sized> {
    pub client: &'a C,
    pub vault: &'a Vault,
    pub vault_name: &'a str,
    pub builder: NoteBuilder,
    pub mode: SyncMode,
    pub note_types: &'a DigestStore<NoteTypeDigest>,
    pub previous: &'a DigestStore<NoteDigest>,
    /// Decks known to exist in Anki
    pub decks: HashSet<String>,
}

impl<C: AnkiClient + ?Sized> Pass<'_, C> {
    /// Process every document; returns the digests to keep and the report
    pub async fn run(mut self, documents: Vec<Document>) -> (BTreeMap<i64, NoteDigest>, SyncReport) {
        let mut working = BTreeMap::new();
        let mut report = SyncReport::new();

        for document in documents {
            if !document.is_managed() {
                continue;
            }
            self.process(document, &mut working, &mut report).await;
        }

        (working, report)
    }

    async fn process(
        &mut self,
        document: Document,
        working: &mut BTreeMap<i64, NoteDigest>,
        report: &mut SyncReport,
    ) {
        let label = document.path.to_string_lossy().into_owned();
        let digest = self.builder.digest(&document);

        if let Some(nid) = document.note_id().filter(|nid| *nid != 0) {
            if self.mode == SyncMode::Incremental && self.previous.get(nid) == Some(&digest) {
                debug!("Unchanged: {}", label);
                working.insert(nid, digest);
                report.cached.push(label);
                return;
            }
        }

        self.push_media(&document).await;

        let (mut note, _media) = match self.builder.build_and_validate(&document, self.note_types) {
            Ok(built) => built,
            Err(e) => {
                warn!("{}", e);
                report.malformed.push(label);
                report.notices.push(e.to_string());
                return;
            }
        };

        if !self.ensure_deck(&note.deck, report).await {
            return;
        }

        if note.nid == 0 {
            self.create(&document, &mut note, label, working, report).await;
        } else {
            self.update(&note, label, working, report).await;
        }
    }

    /// Upload every resolvable media embed, concurrently
    ///
    /// Failures are logged only; the note is still pushed.
    async fn push_media(&self, document: &Document) {
        let mut seen = HashSet::new();
        let uploads: Vec<StoreMedia> = document
            .embeds
            .iter()
            .filter(|embed| is_media(&embed.link))
            .filter_map(|embed| {
                let path = self.vault.resolve_link(&embed.link)?;
                let filename = media_file_name(&embed.link).to_string();
                seen.insert(filename.clone()).then(|| StoreMedia {
                    filename,
                    path: path.to_string_lossy().into_owned(),
                    delete_existing: true,
                })
            })
            .collect();

        if uploads.is_empty() {
            return;
        }

        let results = join_all(uploads.iter().map(|media| self.client.store_media_file(media))).await;
        for (media, result) in uploads.iter().zip(results) {
            match result {
                Ok(()) => debug!("Stored media {}", media.filename),
                Err(e) => warn!("Failed to store media {}: {}", media.filename, e),
            }
        }
    }

    async fn ensure_deck(&mut self, deck: &str, report: &mut SyncReport) -> bool {
        if self.decks.contains(deck) {
            return true;
        }

        match self.client.create_deck(deck).await {
            Ok(_) => {
                info!("Created deck {}", deck);
                self.decks.insert(deck.to_string());
                report.added_decks.push(deck.to_string());
                true
            }
            Err(e) => {
                warn!("Failed to create deck {}: {}", deck, e);
                report.error(format!("Failed to create deck {}: {}", deck, e));
                false
            }
        }
    }

    async fn create(
        &self,
        document: &Document,
        note: &mut Note,
        label: String,
        working: &mut BTreeMap<i64, NoteDigest>,
        report: &mut SyncReport,
    ) {
        let nid = match self.client.add_note(&note.to_anki_note(self.vault_name)).await {
            Ok(nid) => nid,
            Err(e) => {
                warn!("Failed to add note for {}: {}", label, e);
                report.error(format!("Failed to add note for {}: {}", label, e));
                return;
            }
        };
        note.nid = nid;
        info!("Created note {} for {}", nid, label);

        // The document now carries its id, so fingerprint the new text
        let written = self
            .builder
            .serialize(note)
            .map_err(|e| e.to_string())
            .and_then(|text| {
                self.vault
                    .write(&document.path, &text)
                    .map(|()| text)
                    .map_err(|e| e.to_string())
            });
        let digest = match written {
            Ok(text) => self.builder.digest(&Document::parse(&document.path, text)),
            Err(e) => {
                warn!("Failed to write note id into {}: {}", label, e);
                report.error(format!("Failed to write note id into {}: {}", label, e));
                note.digest()
            }
        };

        working.insert(nid, digest);
        report.created.push(label);
    }

    /// Move and/or rewrite an existing note
    ///
    /// The deck move and the field update are independent; the recorded
    /// digest keeps the previous half of whichever one failed.
    async fn update(
        &self,
        note: &Note,
        label: String,
        working: &mut BTreeMap<i64, NoteDigest>,
        report: &mut SyncReport,
    ) {
        let previous = self.previous.get(note.nid);

        let deck_ok = if previous.map_or(true, |p| p.deck != note.deck) {
            match self.move_to_deck(note).await {
                Ok(()) => {
                    report.changed_deck.push(label.clone());
                    true
                }
                Err(message) => {
                    warn!("{}", message);
                    report.error(message);
                    false
                }
            }
        } else {
            true
        };

        let fields_ok = if previous.map_or(true, |p| p.hash != note.hash) {
            match self.update_fields(note).await {
                Ok(()) => {
                    report.modified.push(label.clone());
                    true
                }
                Err(message) => {
                    warn!("{}", message);
                    report.error(message);
                    false
                }
            }
        } else {
            true
        };

        if previous.is_none() && !deck_ok && !fields_ok {
            return;
        }

        let deck = if deck_ok {
            note.deck.clone()
        } else {
            previous.map(|p| p.deck.clone()).unwrap_or_default()
        };
        let hash = if fields_ok {
            note.hash.clone()
        } else {
            previous.map(|p| p.hash.clone()).unwrap_or_default()
        };
        working.insert(note.nid, NoteDigest { deck, hash });
    }

    async fn move_to_deck(&self, note: &Note) -> Result<(), String> {
        let fail = |e: &dyn std::fmt::Display| {
            format!("Failed to move note {} to {}: {}", note.nid, note.deck, e)
        };

        let infos = self
            .client
            .notes_info(&[note.nid])
            .await
            .map_err(|e| fail(&e))?;
        let cards: Vec<i64> = infos
            .into_iter()
            .find(|info| info.note_id == note.nid)
            .map(|info| info.cards)
            .ok_or_else(|| fail(&"note not found in Anki"))?;

        self.client
            .change_deck(&cards, &note.deck)
            .await
            .map_err(|e| fail(&e))?;
        info!("Moved note {} to {}", note.nid, note.deck);
        Ok(())
    }

    async fn update_fields(&self, note: &Note) -> Result<(), String> {
        let fail = |e: &dyn std::fmt::Display| format!("Failed to update note {}: {}", note.nid, e);

        self.client
            .update_note_fields(note.nid, &note.format_fields(self.vault_name))
            .await
            .map_err(|e| fail(&e))?;
        self.client
            .update_note_tags(note.nid, &note.tags)
            .await
            .map_err(|e| fail(&e))?;
        debug!("Updated note {}", note.nid);
        Ok(())
    }
}
