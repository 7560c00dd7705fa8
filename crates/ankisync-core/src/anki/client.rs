//! AnkiConnect client
//!
//! `AnkiClient` is the seam the sync engine talks through; `HttpAnkiClient`
//! is the real implementation speaking JSON over HTTP.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use super::message::{Action, AnkiNote, NoteInfo, Request, Response, StoreMedia, API_VERSION};

/// Errors returned by store calls
#[derive(Error, Debug)]
pub enum AnkiError {
    /// The HTTP request itself failed (Anki not running, refused, timeout)
    #[error("AnkiConnect unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response was not a valid envelope or had an unexpected shape
    #[error("Unexpected AnkiConnect response: {0}")]
    Decode(#[from] serde_json::Error),

    /// AnkiConnect answered with a non-null `error`
    #[error("Anki rejected the request: {0}")]
    Store(String),
}

impl AnkiError {
    /// Whether this failure means the store can't be talked to at all
    pub fn is_connectivity(&self) -> bool {
        matches!(self, AnkiError::Transport(_) | AnkiError::Decode(_))
    }
}

pub type AnkiResult<T> = Result<T, AnkiError>;

/// Operations the sync engine needs from the flashcard store
#[async_trait]
pub trait AnkiClient: Send + Sync {
    /// AnkiConnect API version
    async fn version(&self) -> AnkiResult<u32>;

    /// All deck names
    async fn deck_names(&self) -> AnkiResult<Vec<String>>;

    /// Note type name → id
    async fn model_names_and_ids(&self) -> AnkiResult<HashMap<String, i64>>;

    /// Field names of one note type, in template order
    async fn model_field_names(&self, model_name: &str) -> AnkiResult<Vec<String>>;

    /// Field names for many note types in one batched call
    ///
    /// The result is ordered like `model_names`.
    async fn model_field_names_batch(&self, model_names: &[String])
        -> AnkiResult<Vec<Vec<String>>>;

    async fn notes_info(&self, note_ids: &[i64]) -> AnkiResult<Vec<NoteInfo>>;

    async fn store_media_file(&self, media: &StoreMedia) -> AnkiResult<()>;

    /// Create a note, returning its id
    async fn add_note(&self, note: &AnkiNote) -> AnkiResult<i64>;

    async fn update_note_fields(
        &self,
        note_id: i64,
        fields: &BTreeMap<String, String>,
    ) -> AnkiResult<()>;

    /// Replace the note's tags
    async fn update_note_tags(&self, note_id: i64, tags: &[String]) -> AnkiResult<()>;

    async fn delete_notes(&self, note_ids: &[i64]) -> AnkiResult<()>;

    /// Move cards to a deck
    async fn change_deck(&self, card_ids: &[i64], deck: &str) -> AnkiResult<()>;

    async fn create_deck(&self, deck: &str) -> AnkiResult<i64>;
}

/// AnkiConnect client over HTTP
#[derive(Debug, Clone)]
pub struct HttpAnkiClient {
    url: String,
    http: reqwest::Client,
}

impl HttpAnkiClient {
    /// Create a client for the given AnkiConnect URL
    pub fn new(url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            url: url.into(),
            http,
        }
    }

    /// Send one action and decode its result
    async fn invoke<P, R>(&self, action: &str, params: Option<P>) -> AnkiResult<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        debug!("AnkiConnect call: {}", action);
        let request = Request::new(action, params);
        let response: Response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        unwrap_envelope(response)
    }

    /// Send the same action many times through `multi`
    async fn multi<P, R>(&self, action: &str, params: Vec<P>) -> AnkiResult<Vec<R>>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let actions: Vec<Action<P>> = params
            .into_iter()
            .map(|params| Action {
                action: action.to_string(),
                version: API_VERSION,
                params,
            })
            .collect();
        let responses: Vec<Response> = self
            .invoke("multi", Some(json!({ "actions": actions })))
            .await?;
        responses.into_iter().map(unwrap_envelope).collect()
    }
}

/// Turn an envelope into a typed result
fn unwrap_envelope<R: DeserializeOwned>(response: Response) -> AnkiResult<R> {
    if let Some(error) = response.error {
        return Err(AnkiError::Store(error));
    }
    Ok(serde_json::from_value(response.result)?)
}

#[async_trait]
impl AnkiClient for HttpAnkiClient {
    async fn version(&self) -> AnkiResult<u32> {
        self.invoke("version", None::<()>).await
    }

    async fn deck_names(&self) -> AnkiResult<Vec<String>> {
        self.invoke("deckNames", None::<()>).await
    }

    async fn model_names_and_ids(&self) -> AnkiResult<HashMap<String, i64>> {
        self.invoke("modelNamesAndIds", None::<()>).await
    }

    async fn model_field_names(&self, model_name: &str) -> AnkiResult<Vec<String>> {
        self.invoke("modelFieldNames", Some(json!({ "modelName": model_name })))
            .await
    }

    async fn model_field_names_batch(
        &self,
        model_names: &[String],
    ) -> AnkiResult<Vec<Vec<String>>> {
        let params = model_names
            .iter()
            .map(|name| json!({ "modelName": name }))
            .collect();
        self.multi("modelFieldNames", params).await
    }

    async fn notes_info(&self, note_ids: &[i64]) -> AnkiResult<Vec<NoteInfo>> {
        self.invoke("notesInfo", Some(json!({ "notes": note_ids })))
            .await
    }

    async fn store_media_file(&self, media: &StoreMedia) -> AnkiResult<()> {
        let _: serde_json::Value = self.invoke("storeMediaFile", Some(media)).await?;
        Ok(())
    }

    async fn add_note(&self, note: &AnkiNote) -> AnkiResult<i64> {
        let id: Option<i64> = self.invoke("addNote", Some(json!({ "note": note }))).await?;
        id.ok_or_else(|| AnkiError::Store("addNote returned no note id".to_string()))
    }

    async fn update_note_fields(
        &self,
        note_id: i64,
        fields: &BTreeMap<String, String>,
    ) -> AnkiResult<()> {
        self.invoke(
            "updateNoteFields",
            Some(json!({ "note": { "id": note_id, "fields": fields } })),
        )
        .await
    }

    async fn update_note_tags(&self, note_id: i64, tags: &[String]) -> AnkiResult<()> {
        self.invoke(
            "updateNoteTags",
            Some(json!({ "note": note_id, "tags": tags })),
        )
        .await
    }

    async fn delete_notes(&self, note_ids: &[i64]) -> AnkiResult<()> {
        self.invoke("deleteNotes", Some(json!({ "notes": note_ids })))
            .await
    }

    async fn change_deck(&self, card_ids: &[i64], deck: &str) -> AnkiResult<()> {
        self.invoke(
            "changeDeck",
            Some(json!({ "cards": card_ids, "deck": deck })),
        )
        .await
    }

    async fn create_deck(&self, deck: &str) -> AnkiResult<i64> {
        self.invoke("createDeck", Some(json!({ "deck": deck })))
            .await
    }
}
