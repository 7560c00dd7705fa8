//! AnkiConnect message types
//!
//! Every call is a JSON envelope `{action, version, params}` answered by
//! `{result, error}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// AnkiConnect API version spoken by this client
pub const API_VERSION: u32 = 6;

/// Request envelope
#[derive(Debug, Clone, Serialize)]
pub struct Request<P> {
    pub action: String,
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<P>,
}

impl<P> Request<P> {
    pub fn new(action: impl Into<String>, params: Option<P>) -> Self {
        Self {
            action: action.into(),
            version: API_VERSION,
            params,
        }
    }
}

/// One entry of a `multi` batch
///
/// Entries carry their own version; without it AnkiConnect answers them with
/// bare results instead of envelopes.
#[derive(Debug, Clone, Serialize)]
pub struct Action<P> {
    pub action: String,
    pub version: u32,
    pub params: P,
}

/// Response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

/// A note as sent to `addNote`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnkiNote {
    pub deck_name: String,
    pub model_name: String,
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

/// Subset of `notesInfo` output needed for deck moves
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInfo {
    pub note_id: i64,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cards: Vec<i64>,
}

/// A media file pushed with `storeMediaFile`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMedia {
    pub filename: String,
    pub path: String,
    pub delete_existing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::new("deckNames", None::<()>);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({"action": "deckNames", "version": 6}));

        let req = Request::new("createDeck", Some(serde_json::json!({"deck": "A::B"})));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["params"]["deck"], "A::B");
    }

    #[test]
    fn test_multi_entry_carries_version() {
        let action = Action {
            action: "modelFieldNames".to_string(),
            version: API_VERSION,
            params: serde_json::json!({"modelName": "Basic"}),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["version"], 6);
        assert_eq!(json["params"]["modelName"], "Basic");
    }

    #[test]
    fn test_response_error_envelope() {
        let resp: Response =
            serde_json::from_str(r#"{"result": null, "error": "model was not found"}"#).unwrap();
        assert_eq!(resp.error.as_deref(), Some("model was not found"));
        assert!(resp.result.is_null());
    }

    #[test]
    fn test_anki_note_camel_case() {
        let note = AnkiNote {
            deck_name: "Default".to_string(),
            model_name: "Basic".to_string(),
            fields: BTreeMap::from([("Front".to_string(), "q".to_string())]),
            tags: vec!["obsidian-sync".to_string()],
        };
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["deckName"], "Default");
        assert_eq!(json["modelName"], "Basic");
        assert_eq!(json["fields"]["Front"], "q");
    }

    #[test]
    fn test_note_info_ignores_extra_fields() {
        let info: NoteInfo = serde_json::from_str(
            r#"{"noteId": 7, "modelName": "Basic", "tags": [], "fields": {}, "cards": [70, 71]}"#,
        )
        .unwrap();
        assert_eq!(info.note_id, 7);
        assert_eq!(info.cards, vec![70, 71]);
    }
}
