//! Note model

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use super::media::MediaRef;

/// The store's integer identifier for a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(u64);

impl NoteId {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<u64> for NoteId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Duplicate handling requested from the store when adding a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteOptions {
    pub allow_duplicate: bool,
    pub duplicate_scope: String,
}

impl Default for NoteOptions {
    fn default() -> Self {
        Self {
            allow_duplicate: false,
            duplicate_scope: "deck".to_string(),
        }
    }
}

/// One flashcard destined for the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Store-assigned identifier, absent until the note is first added
    pub id: Option<NoteId>,
    /// Target deck
    pub deck: String,
    /// Category (note type) governing the field set
    pub category: String,
    /// Field name to content
    pub fields: BTreeMap<String, String>,
    pub options: NoteOptions,
    pub tags: BTreeSet<String>,
    /// Media files referenced from the fields
    pub media: Vec<MediaRef>,
}

impl Note {
    /// Create an empty note of `category` in `deck`
    #[must_use]
    pub fn new(deck: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: None,
            deck: deck.into(),
            category: category.into(),
            fields: BTreeMap::new(),
            options: NoteOptions::default(),
            tags: BTreeSet::new(),
            media: Vec::new(),
        }
    }

    /// Whether every field is blank
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.values().all(|content| content.trim().is_empty())
    }

    /// Short label for logs and reports: the id, or the start of the first non-empty field.
    #[must_use]
    pub fn label(&self, max_len: usize) -> String {
        if let Some(id) = self.id {
            return format!("#{id}");
        }
        let preview: String = self
            .fields
            .values()
            .find(|content| !content.trim().is_empty())
            .map(|content| content.lines().next().unwrap_or("").trim())
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect();
        format!("new {} note \"{preview}\"", self.category)
    }
}
