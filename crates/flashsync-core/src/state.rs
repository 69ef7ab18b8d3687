//! Persisted sync state.
//!
//! Everything that must survive between runs: settings, the media registry and
//! per-file hashes plus the notes last synced from each file. The on-disk shape
//! is `{settings, "Added Media", "File Hashes", "File Notes"}`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Note, NoteId, Settings};
use crate::util::write_atomic;

/// What was last sent to the store for one note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedNote {
    pub deck: String,
    /// Rendered field HTML
    pub fields: BTreeMap<String, String>,
    pub tags: BTreeSet<String>,
}

impl From<&Note> for RecordedNote {
    fn from(note: &Note) -> Self {
        Self {
            deck: note.deck.clone(),
            fields: note.fields.clone(),
            tags: note.tags.clone(),
        }
    }
}

/// Per-file sync record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileState {
    /// Hash of the file as of the last clean sync
    pub content_hash: Option<String>,
    pub notes: BTreeMap<NoteId, RecordedNote>,
}

impl FileState {
    pub fn note_ids(&self) -> BTreeSet<NoteId> {
        self.notes.keys().copied().collect()
    }
}

/// All state owned by the sync engine between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PersistedData", into = "PersistedData")]
pub struct SyncState {
    pub settings: Settings,
    /// Media file names already uploaded to the store
    pub added_media: BTreeSet<String>,
    pub files: BTreeMap<String, FileState>,
}

impl SyncState {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Load state from `path`, returning `None` when no state was saved yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Write state to `path`, replacing the previous file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        write_atomic(path, &serialized)
    }

    pub fn file(&self, path: &str) -> Option<&FileState> {
        self.files.get(path)
    }

    /// Whether the stored settings need a regeneration against the store.
    ///
    /// Invalid syntax tokens are not counted; regeneration cannot repair them.
    pub fn needs_regeneration(&self) -> bool {
        !self.settings.unknown_keys().is_empty()
            || self.settings.fields.is_empty()
            || self.settings.validate_categories().is_err()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedData {
    #[serde(default)]
    settings: Settings,
    #[serde(rename = "Added Media", default)]
    added_media: BTreeSet<String>,
    #[serde(rename = "File Hashes", default)]
    file_hashes: BTreeMap<String, String>,
    #[serde(rename = "File Notes", default)]
    file_notes: BTreeMap<String, BTreeMap<NoteId, RecordedNote>>,
}

impl From<PersistedData> for SyncState {
    fn from(data: PersistedData) -> Self {
        let mut files: BTreeMap<String, FileState> = BTreeMap::new();
        for (path, notes) in data.file_notes {
            files.entry(path).or_default().notes = notes;
        }
        for (path, hash) in data.file_hashes {
            files.entry(path).or_default().content_hash = Some(hash);
        }
        Self {
            settings: data.settings,
            added_media: data.added_media,
            files,
        }
    }
}

impl From<SyncState> for PersistedData {
    fn from(state: SyncState) -> Self {
        let mut file_hashes = BTreeMap::new();
        let mut file_notes = BTreeMap::new();
        for (path, file) in state.files {
            if let Some(hash) = file.content_hash {
                file_hashes.insert(path.clone(), hash);
            }
            if !file.notes.is_empty() {
                file_notes.insert(path, file.notes);
            }
        }
        Self {
            settings: state.settings,
            added_media: state.added_media,
            file_hashes,
            file_notes,
        }
    }
}
