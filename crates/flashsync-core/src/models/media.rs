//! Media reference model

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Where the store should fetch a media file from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSource {
    /// Absolute path on the local machine
    Path(PathBuf),
    /// Remote http(s) URL
    Url(String),
}

/// A media file referenced by a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// File name the store saves the media under
    pub filename: String,
    pub source: MediaSource,
    /// Fields of the owning note that reference this file
    pub referenced_fields: BTreeSet<String>,
}

impl MediaRef {
    #[must_use]
    pub fn new(filename: impl Into<String>, source: MediaSource, field: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            source,
            referenced_fields: BTreeSet::from([field.into()]),
        }
    }
}

/// Merge references to the same filename, unioning the referencing fields.
pub fn merge_media(refs: impl IntoIterator<Item = MediaRef>) -> Vec<MediaRef> {
    let mut merged: Vec<MediaRef> = Vec::new();
    for media in refs {
        if let Some(existing) = merged
            .iter_mut()
            .find(|existing| existing.filename == media.filename)
        {
            existing.referenced_fields.extend(media.referenced_fields);
        } else {
            merged.push(media);
        }
    }
    merged
}
