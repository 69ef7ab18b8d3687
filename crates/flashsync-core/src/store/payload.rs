//! Request envelopes and response validation.

use serde_json::{json, Map, Value};

use super::StoreError;
use crate::models::{MediaRef, MediaSource, Note, NoteId};

/// Protocol version sent with every request.
pub const PROTOCOL_VERSION: u32 = 6;

/// Build the `{action, version, params}` envelope for one call.
pub fn request(action: &str, params: Value) -> Value {
    let params = if params.is_null() {
        Value::Object(Map::new())
    } else {
        params
    };
    json!({
        "action": action,
        "version": PROTOCOL_VERSION,
        "params": params,
    })
}

/// Validate a response envelope and extract its `result`.
///
/// The envelope must be an object with exactly the members `error` and
/// `result`. A non-null `error` is returned verbatim as a remote failure.
pub fn parse_response(response: Value) -> Result<Value, StoreError> {
    let Value::Object(mut members) = response else {
        return Err(StoreError::Malformed(
            "response is not a JSON object".to_string(),
        ));
    };
    if members.len() != 2 {
        return Err(StoreError::Malformed(
            "response has an unexpected number of fields".to_string(),
        ));
    }
    let Some(error) = members.remove("error") else {
        return Err(StoreError::Malformed(
            "response is missing required error field".to_string(),
        ));
    };
    let Some(result) = members.remove("result") else {
        return Err(StoreError::Malformed(
            "response is missing required result field".to_string(),
        ));
    };

    match error {
        Value::Null => Ok(result),
        Value::String(message) => Err(StoreError::Remote(message)),
        other => Err(StoreError::Remote(other.to_string())),
    }
}

/// Note body used by `addNote` and `canAddNotes`.
pub fn note_payload(note: &Note) -> Value {
    json!({
        "deckName": note.deck,
        "modelName": note.category,
        "fields": note.fields,
        "options": note.options,
        "tags": note.tags,
    })
}

/// Note body used by `updateNote`: fields and tags only.
pub fn update_payload(id: NoteId, note: &Note) -> Value {
    json!({
        "note": {
            "id": id,
            "fields": note.fields,
            "tags": note.tags,
        }
    })
}

pub fn media_payload(media: &MediaRef) -> Value {
    match &media.source {
        MediaSource::Path(path) => json!({
            "filename": media.filename,
            "path": path,
        }),
        MediaSource::Url(url) => json!({
            "filename": media.filename,
            "url": url,
        }),
    }
}
