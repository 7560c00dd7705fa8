//! In-memory AnkiConnect stand-in for tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::{AnkiClient, AnkiError, AnkiResult};
use super::message::{AnkiNote, NoteInfo, StoreMedia};

/// A note held by the mock store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredNote {
    pub deck: String,
    pub model: String,
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub cards: Vec<i64>,
}

#[derive(Debug, Default)]
struct Inner {
    unreachable: bool,
    failing: HashSet<String>,
    decks: Vec<String>,
    models: Vec<(String, i64, Vec<String>)>,
    notes: BTreeMap<i64, StoredNote>,
    media: Vec<StoreMedia>,
    next_id: i64,
    calls: Vec<String>,
}

/// Records every call and keeps just enough state to answer them
#[derive(Debug, Default)]
pub struct MockAnkiClient {
    inner: Mutex<Inner>,
}

/// Actions that don't change anything in Anki
const READ_ONLY: &[&str] = &[
    "version",
    "deckNames",
    "modelNamesAndIds",
    "modelFieldNames",
    "multi",
    "notesInfo",
];

impl MockAnkiClient {
    pub fn new() -> Self {
        let client = Self::default();
        {
            let mut inner = client.inner.lock().unwrap();
            inner.decks.push("Default".to_string());
            inner.next_id = 1_000;
        }
        client
    }

    pub fn with_model(self, name: &str, id: i64, fields: &[&str]) -> Self {
        self.inner.lock().unwrap().models.push((
            name.to_string(),
            id,
            fields.iter().map(|f| f.to_string()).collect(),
        ));
        self
    }

    pub fn with_deck(self, deck: &str) -> Self {
        self.inner.lock().unwrap().decks.push(deck.to_string());
        self
    }

    pub fn with_note(self, id: i64, deck: &str) -> Self {
        self.inner.lock().unwrap().notes.insert(
            id,
            StoredNote {
                deck: deck.to_string(),
                model: String::new(),
                fields: BTreeMap::new(),
                tags: Vec::new(),
                cards: vec![id * 10],
            },
        );
        self
    }

    /// Make every call fail at the transport level
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.lock().unwrap().unreachable = unreachable;
    }

    /// Make one action answer with an error envelope
    pub fn fail_action(&self, action: &str) {
        self.inner.lock().unwrap().failing.insert(action.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    /// Calls that would change Anki's collection
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !READ_ONLY.contains(&c.as_str()))
            .collect()
    }

    pub fn note(&self, id: i64) -> Option<StoredNote> {
        self.inner.lock().unwrap().notes.get(&id).cloned()
    }

    pub fn note_count(&self) -> usize {
        self.inner.lock().unwrap().notes.len()
    }

    pub fn decks(&self) -> Vec<String> {
        self.inner.lock().unwrap().decks.clone()
    }

    pub fn media(&self) -> Vec<StoreMedia> {
        self.inner.lock().unwrap().media.clone()
    }

    /// Record a call and apply failure injection
    fn enter(&self, action: &str) -> AnkiResult<std::sync::MutexGuard<'_, Inner>> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(action.to_string());
        if inner.unreachable {
            // An invalid envelope stands in for a dead connection
            let err = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
            return Err(AnkiError::Decode(err));
        }
        if inner.failing.contains(action) {
            return Err(AnkiError::Store(format!("{} failed", action)));
        }
        Ok(inner)
    }
}

#[async_trait]
impl AnkiClient for MockAnkiClient {
    async fn version(&self) -> AnkiResult<u32> {
        self.enter("version")?;
        Ok(6)
    }

    async fn deck_names(&self) -> AnkiResult<Vec<String>> {
        let inner = self.enter("deckNames")?;
        Ok(inner.decks.clone())
    }

    async fn model_names_and_ids(&self) -> AnkiResult<HashMap<String, i64>> {
        let inner = self.enter("modelNamesAndIds")?;
        Ok(inner
            .models
            .iter()
            .map(|(name, id, _)| (name.clone(), *id))
            .collect())
    }

    async fn model_field_names(&self, model_name: &str) -> AnkiResult<Vec<String>> {
        let inner = self.enter("modelFieldNames")?;
        inner
            .models
            .iter()
            .find(|(name, _, _)| name == model_name)
            .map(|(_, _, fields)| fields.clone())
            .ok_or_else(|| AnkiError::Store(format!("model was not found: {}", model_name)))
    }

    async fn model_field_names_batch(
        &self,
        model_names: &[String],
    ) -> AnkiResult<Vec<Vec<String>>> {
        let inner = self.enter("multi")?;
        model_names
            .iter()
            .map(|wanted| {
                inner
                    .models
                    .iter()
                    .find(|(name, _, _)| name == wanted)
                    .map(|(_, _, fields)| fields.clone())
                    .ok_or_else(|| AnkiError::Store(format!("model was not found: {}", wanted)))
            })
            .collect()
    }

    async fn notes_info(&self, note_ids: &[i64]) -> AnkiResult<Vec<NoteInfo>> {
        let inner = self.enter("notesInfo")?;
        Ok(note_ids
            .iter()
            .filter_map(|id| {
                inner.notes.get(id).map(|note| NoteInfo {
                    note_id: *id,
                    model_name: note.model.clone(),
                    tags: note.tags.clone(),
                    cards: note.cards.clone(),
                })
            })
            .collect())
    }

    async fn store_media_file(&self, media: &StoreMedia) -> AnkiResult<()> {
        let mut inner = self.enter("storeMediaFile")?;
        inner.media.push(media.clone());
        Ok(())
    }

    async fn add_note(&self, note: &AnkiNote) -> AnkiResult<i64> {
        let mut inner = self.enter("addNote")?;
        if !inner.decks.contains(&note.deck_name) {
            return Err(AnkiError::Store("deck was not found".to_string()));
        }
        inner.next_id += 1;
        let id = inner.next_id;
        inner.notes.insert(
            id,
            StoredNote {
                deck: note.deck_name.clone(),
                model: note.model_name.clone(),
                fields: note.fields.clone(),
                tags: note.tags.clone(),
                cards: vec![id * 10],
            },
        );
        Ok(id)
    }

    async fn update_note_fields(
        &self,
        note_id: i64,
        fields: &BTreeMap<String, String>,
    ) -> AnkiResult<()> {
        let mut inner = self.enter("updateNoteFields")?;
        let note = inner
            .notes
            .get_mut(&note_id)
            .ok_or_else(|| AnkiError::Store("note was not found".to_string()))?;
        note.fields = fields.clone();
        Ok(())
    }

    async fn update_note_tags(&self, note_id: i64, tags: &[String]) -> AnkiResult<()> {
        let mut inner = self.enter("updateNoteTags")?;
        let note = inner
            .notes
            .get_mut(&note_id)
            .ok_or_else(|| AnkiError::Store("note was not found".to_string()))?;
        note.tags = tags.to_vec();
        Ok(())
    }

    async fn delete_notes(&self, note_ids: &[i64]) -> AnkiResult<()> {
        let mut inner = self.enter("deleteNotes")?;
        for id in note_ids {
            inner.notes.remove(id);
        }
        Ok(())
    }

    async fn change_deck(&self, card_ids: &[i64], deck: &str) -> AnkiResult<()> {
        let mut inner = self.enter("changeDeck")?;
        for note in inner.notes.values_mut() {
            if note.cards.iter().any(|c| card_ids.contains(c)) {
                note.deck = deck.to_string();
            }
        }
        Ok(())
    }

    async fn create_deck(&self, deck: &str) -> AnkiResult<i64> {
        let mut inner = self.enter("createDeck")?;
        if !inner.decks.iter().any(|d| d == deck) {
            inner.decks.push(deck.to_string());
        }
        Ok(inner.decks.len() as i64)
    }
}
