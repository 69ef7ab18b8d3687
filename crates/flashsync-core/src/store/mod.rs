//! Client for an AnkiConnect-compatible flashcard store.
//!
//! Every call is a JSON envelope posted to the store and answered with an
//! `{error, result}` envelope. The client performs no retries.

mod http;
mod payload;

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{MediaRef, Note, NoteId};

pub use http::HttpTransport;
pub use payload::{parse_response, request, PROTOCOL_VERSION};

/// Failures talking to the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The response did not have the expected envelope or result shape
    #[error("Malformed store response: {0}")]
    Malformed(String),

    /// The store answered with an error message
    #[error("{0}")]
    Remote(String),

    /// No listener, refused connection or timeout
    #[error("Store unreachable: {0}")]
    Unreachable(String),
}

impl StoreError {
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

/// Delivers one request envelope and returns the raw response envelope.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn post(&self, envelope: &Value) -> Result<Value, StoreError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    async fn post(&self, envelope: &Value) -> Result<Value, StoreError> {
        (**self).post(envelope).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteInfo {
    note_id: Option<NoteId>,
    #[serde(default)]
    cards: Vec<u64>,
}

/// Typed actions over a [`Transport`].
#[derive(Debug, Clone)]
pub struct StoreClient<T> {
    transport: T,
}

impl<T: Transport> StoreClient<T> {
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `action` and return its validated result.
    pub async fn invoke(&self, action: &str, params: Value) -> Result<Value, StoreError> {
        tracing::debug!(action, "Store request");
        let response = self.transport.post(&request(action, params)).await?;
        parse_response(response)
    }

    async fn invoke_as<D: DeserializeOwned>(
        &self,
        action: &str,
        params: Value,
    ) -> Result<D, StoreError> {
        let result = self.invoke(action, params).await?;
        serde_json::from_value(result)
            .map_err(|error| StoreError::Malformed(format!("unexpected {action} result: {error}")))
    }

    /// Protocol version reported by the store.
    pub async fn version(&self) -> Result<u32, StoreError> {
        self.invoke_as("version", Value::Null).await
    }

    pub async fn model_names(&self) -> Result<Vec<String>, StoreError> {
        self.invoke_as("modelNames", Value::Null).await
    }

    pub async fn model_field_names(&self, model: &str) -> Result<Vec<String>, StoreError> {
        self.invoke_as("modelFieldNames", json!({ "modelName": model }))
            .await
    }

    /// Every category with its field names, in store order.
    pub async fn categories(&self) -> Result<BTreeMap<String, Vec<String>>, StoreError> {
        let mut categories = BTreeMap::new();
        for model in self.model_names().await? {
            let fields = self.model_field_names(&model).await?;
            categories.insert(model, fields);
        }
        Ok(categories)
    }

    pub async fn add_note(&self, note: &Note) -> Result<NoteId, StoreError> {
        let id: Option<NoteId> = self
            .invoke_as("addNote", json!({ "note": payload::note_payload(note) }))
            .await?;
        id.ok_or_else(|| StoreError::Malformed("addNote returned no note id".to_string()))
    }

    pub async fn update_note(&self, id: NoteId, note: &Note) -> Result<(), StoreError> {
        self.invoke("updateNote", payload::update_payload(id, note))
            .await
            .map(drop)
    }

    /// Move the cards of `ids` into `deck`.
    pub async fn change_deck(&self, ids: &[NoteId], deck: &str) -> Result<(), StoreError> {
        let cards: Vec<u64> = self
            .notes_info(ids)
            .await?
            .into_iter()
            .flat_map(|info| info.cards)
            .collect();
        if cards.is_empty() {
            return Ok(());
        }
        self.invoke("changeDeck", json!({ "cards": cards, "deck": deck }))
            .await
            .map(drop)
    }

    pub async fn delete_notes(&self, ids: &[NoteId]) -> Result<(), StoreError> {
        self.invoke("deleteNotes", json!({ "notes": ids }))
            .await
            .map(drop)
    }

    /// The subset of `ids` that the store still knows.
    pub async fn existing_note_ids(&self, ids: &[NoteId]) -> Result<BTreeSet<NoteId>, StoreError> {
        Ok(self
            .notes_info(ids)
            .await?
            .into_iter()
            .filter_map(|info| info.note_id)
            .collect())
    }

    async fn notes_info(&self, ids: &[NoteId]) -> Result<Vec<NoteInfo>, StoreError> {
        self.invoke_as("notesInfo", json!({ "notes": ids })).await
    }

    /// Whether each note could be added without violating the duplicate policy.
    pub async fn can_add_notes(&self, notes: &[Note]) -> Result<Vec<bool>, StoreError> {
        let payloads: Vec<Value> = notes.iter().map(payload::note_payload).collect();
        let allowed: Vec<bool> = self
            .invoke_as("canAddNotes", json!({ "notes": payloads }))
            .await?;
        if allowed.len() != notes.len() {
            return Err(StoreError::Malformed(format!(
                "canAddNotes answered {} of {} notes",
                allowed.len(),
                notes.len()
            )));
        }
        Ok(allowed)
    }

    pub async fn store_media_file(&self, media: &MediaRef) -> Result<(), StoreError> {
        self.invoke("storeMediaFile", payload::media_payload(media))
            .await
            .map(drop)
    }
}
