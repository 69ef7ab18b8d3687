//! Reconciliation of Markdown documents with the flashcard store.
//!
//! One document is processed at a time. For each pass the engine parses the
//! text, creates, updates and deletes notes in the store, writes new ids back
//! into the document and records what was synced in its [`SyncState`].

mod report;

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::media::{extract_media, MediaLocator};
use crate::models::{merge_media, CategoryChanges, Note, NoteId};
use crate::mutate::insert_all;
use crate::parser::{parse_document, ParsedNote};
use crate::render::{FieldRenderer, MarkdownRenderer};
use crate::state::{FileState, RecordedNote, SyncState};
use crate::store::{StoreClient, Transport};
use crate::util::content_hash;
use crate::vault::DocumentSink;

pub use report::{DocumentReport, NoteFailure, RunSummary};

const LABEL_LENGTH: usize = 40;

/// Where the documents being synced live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Media links are resolved against this directory and the document's own
    pub vault_root: PathBuf,
    /// Shown in file links
    pub vault_name: String,
}

enum NoteOutcome {
    Created(NoteId),
    Updated(NoteId),
    Unchanged(NoteId),
    Skipped,
}

/// Owns the sync state and drives the store client.
pub struct SyncEngine<T, R = MarkdownRenderer> {
    client: StoreClient<T>,
    renderer: R,
    state: SyncState,
    options: EngineOptions,
}

impl<T: Transport> SyncEngine<T> {
    pub fn new(client: StoreClient<T>, state: SyncState, options: EngineOptions) -> Self {
        Self::with_renderer(client, MarkdownRenderer, state, options)
    }
}

impl<T: Transport, R: FieldRenderer> SyncEngine<T, R> {
    pub fn with_renderer(
        client: StoreClient<T>,
        renderer: R,
        state: SyncState,
        options: EngineOptions,
    ) -> Self {
        Self {
            client,
            renderer,
            state,
            options,
        }
    }

    pub const fn client(&self) -> &StoreClient<T> {
        &self.client
    }

    pub const fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn into_state(self) -> SyncState {
        self.state
    }

    /// Regenerate the category table if the loaded settings need it.
    ///
    /// Syntax tokens that cannot be told apart are a configuration error.
    pub async fn bootstrap(&mut self) -> Result<Option<CategoryChanges>> {
        self.state.settings.validate_syntax()?;
        if !self.state.needs_regeneration() {
            return Ok(None);
        }
        let unknown = self.state.settings.unknown_keys();
        if !unknown.is_empty() {
            tracing::warn!(?unknown, "Dropping unknown settings keys");
        }
        self.regenerate().await.map(Some)
    }

    /// Refresh the category table from the store's current note types.
    pub async fn regenerate(&mut self) -> Result<CategoryChanges> {
        let categories = self.client.categories().await?;
        let changes = self.state.settings.regenerate(categories);
        self.state.settings.drop_unknown_keys();
        tracing::info!(
            added = ?changes.added,
            removed = ?changes.removed,
            "Regenerated category table"
        );
        Ok(changes)
    }

    /// Reconcile one document with the store.
    ///
    /// `path` is the document's vault key. Per-note store failures and a
    /// failed id write-back are collected in the report. Notes recorded before
    /// a write-back failure stay recorded so a rerun does not create them again.
    pub async fn sync_document<S: DocumentSink + ?Sized>(
        &mut self,
        path: &str,
        text: &str,
        force: bool,
        sink: &mut S,
    ) -> Result<DocumentReport> {
        let mut report = DocumentReport::new(path);
        let previous = self.state.file(path).cloned().unwrap_or_default();
        if !force && previous.content_hash.as_deref() == Some(content_hash(text).as_str()) {
            tracing::debug!(path, "Document unchanged since last sync");
            report.up_to_date = true;
            return Ok(report);
        }

        let mut parsed = parse_document(text, &self.state.settings);
        if !parsed.unknown_categories.is_empty() {
            tracing::info!(
                path,
                categories = ?parsed.unknown_categories,
                "Unknown categories, regenerating category table"
            );
            match self.regenerate().await {
                Ok(_) => parsed = parse_document(text, &self.state.settings),
                Err(error) if error.is_unreachable() => {
                    report.aborted = Some(error.to_string());
                    return Ok(report);
                }
                Err(error) => report.fail("category table", error.to_string()),
            }
        }
        for fault in &parsed.faults {
            tracing::warn!(path, "{fault}");
        }
        report.faults.clone_from(&parsed.faults);

        let id_comments = self.state.settings.defaults.id_comments;
        let mut records = previous.notes.clone();
        let mut insertions = Vec::new();
        // Recorded notes whose id is missing from the text, e.g. after a failed write-back
        let present = parsed.present_ids();
        let mut orphans: Vec<NoteId> = previous
            .notes
            .keys()
            .filter(|id| !present.contains(id))
            .copied()
            .collect();
        for parsed_note in &parsed.notes {
            let note = self.prepare(path, parsed_note, &previous);
            let record = RecordedNote::from(&note);
            if note.id.is_none() {
                let adopted = orphans
                    .iter()
                    .position(|id| previous.notes.get(id) == Some(&record));
                if let Some(index) = adopted {
                    let id = orphans.remove(index);
                    tracing::info!(path, %id, "Restoring id of recorded note");
                    report.unchanged += 1;
                    records.insert(id, record);
                    insertions.push((
                        parsed_note.id_position,
                        parsed_note.form.id_insertion(id, id_comments),
                    ));
                    continue;
                }
            }
            let recorded = note.id.and_then(|id| previous.notes.get(&id));
            match self.submit(&note, recorded, &record).await {
                Ok(NoteOutcome::Created(id)) => {
                    report.created += 1;
                    records.insert(id, record);
                    insertions.push((
                        parsed_note.id_position,
                        parsed_note.form.id_insertion(id, id_comments),
                    ));
                }
                Ok(NoteOutcome::Updated(id)) => {
                    report.updated += 1;
                    records.insert(id, record);
                }
                Ok(NoteOutcome::Unchanged(id)) => {
                    report.unchanged += 1;
                    records.insert(id, record);
                }
                Ok(NoteOutcome::Skipped) => report.skipped += 1,
                Err(error) if error.is_unreachable() => {
                    tracing::warn!(path, "{error}");
                    report.aborted = Some(error.to_string());
                    break;
                }
                Err(error) => {
                    let label = note.label(LABEL_LENGTH);
                    tracing::warn!(path, note = %label, "{error}");
                    report.fail(label, error.to_string());
                }
            }
        }

        if report.aborted.is_none() {
            let mut doomed: BTreeSet<NoteId> = if parsed.faults.is_empty() {
                orphans.into_iter().collect()
            } else {
                tracing::info!(path, "Parse faults present, keeping notes missing from the document");
                BTreeSet::new()
            };
            doomed.extend(parsed.deletions.iter().copied());
            if !doomed.is_empty() {
                let ids: Vec<NoteId> = doomed.into_iter().collect();
                match self.client.delete_notes(&ids).await {
                    Ok(()) => {
                        report.deleted = ids.len();
                        for id in &ids {
                            records.remove(id);
                        }
                    }
                    Err(error) if error.is_unreachable() => {
                        report.aborted = Some(error.to_string());
                    }
                    Err(error) => report.fail(format!("{} removed notes", ids.len()), error.to_string()),
                }
            }
        }

        let file = self.state.files.entry(path.to_string()).or_default();
        file.notes = records;
        file.content_hash = None;

        let synced_text = if insertions.is_empty() {
            Some(text.to_string())
        } else {
            let written = insert_all(text, &insertions)
                .and_then(|rewritten| sink.write_document(path, &rewritten).map(|()| rewritten));
            match written {
                Ok(rewritten) => Some(rewritten),
                Err(error) => {
                    tracing::error!(path, %error, "Failed to write note ids back");
                    report.fail("document", format!("cannot write note ids: {error}"));
                    None
                }
            }
        };

        if let Some(synced) = synced_text.filter(|_| report.is_clean()) {
            if let Some(file) = self.state.files.get_mut(path) {
                file.content_hash = Some(content_hash(&synced));
            }
        }

        tracing::info!(
            path,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            skipped = report.skipped,
            failed = report.failures.len(),
            "Synced document"
        );
        Ok(report)
    }

    /// Render fields, collect media and apply file links and frozen fields.
    fn prepare(&self, path: &str, parsed: &ParsedNote, previous: &FileState) -> Note {
        let settings = &self.state.settings;
        let locator = self.locator(path);
        let mut note = parsed.note.clone();
        let mut media = Vec::new();
        for (field, content) in &mut note.fields {
            let (markup, refs) = extract_media(field, content, &locator);
            media.extend(refs);
            *content = self.renderer.render(&markup);
        }
        note.media = merge_media(media);

        if settings.defaults.add_file_link {
            let first = settings
                .fields_for(&note.category)
                .and_then(<[String]>::first);
            if let Some(content) = first.and_then(|field| note.fields.get_mut(field)) {
                content.push_str(&self.file_link(path));
            }
        }

        if let Some(recorded) = note.id.and_then(|id| previous.notes.get(&id)) {
            for field in &parsed.frozen_fields {
                if let (Some(content), Some(frozen)) =
                    (note.fields.get_mut(field), recorded.fields.get(field))
                {
                    content.clone_from(frozen);
                }
            }
        }
        note
    }

    fn locator(&self, path: &str) -> MediaLocator {
        let root = &self.options.vault_root;
        let document_dir = root
            .join(path)
            .parent()
            .map_or_else(|| root.clone(), std::path::Path::to_path_buf);
        MediaLocator::new([document_dir, root.clone()])
    }

    fn file_link(&self, path: &str) -> String {
        format!(
            "<br><a href=\"obsidian://open?vault={}&file={}\">{path}</a>",
            urlencoding::encode(&self.options.vault_name),
            urlencoding::encode(path)
        )
    }

    async fn submit(
        &mut self,
        note: &Note,
        recorded: Option<&RecordedNote>,
        record: &RecordedNote,
    ) -> Result<NoteOutcome> {
        let Some(id) = note.id else {
            return self.create(note).await;
        };

        match recorded {
            Some(recorded) if recorded == record => return Ok(NoteOutcome::Unchanged(id)),
            Some(_) => {}
            None => {
                let existing = self.client.existing_note_ids(&[id]).await?;
                if !existing.contains(&id) {
                    return Err(Error::NotFound(format!(
                        "note {id} does not exist in the store"
                    )));
                }
            }
        }

        self.upload_media(note).await?;
        self.client.update_note(id, note).await?;
        if recorded.is_none_or(|recorded| recorded.deck != note.deck) {
            self.client.change_deck(&[id], &note.deck).await?;
        }
        tracing::debug!(%id, "Updated note");
        Ok(NoteOutcome::Updated(id))
    }

    async fn create(&mut self, note: &Note) -> Result<NoteOutcome> {
        if !note.options.allow_duplicate {
            let allowed = self
                .client
                .can_add_notes(std::slice::from_ref(note))
                .await?;
            if allowed.first() != Some(&true) {
                tracing::info!(
                    note = %note.label(LABEL_LENGTH),
                    deck = %note.deck,
                    scope = %note.options.duplicate_scope,
                    "Skipping duplicate note"
                );
                return Ok(NoteOutcome::Skipped);
            }
        }
        self.upload_media(note).await?;
        let id = self.client.add_note(note).await?;
        tracing::debug!(%id, "Created note");
        Ok(NoteOutcome::Created(id))
    }

    /// Upload media not yet in the registry; runs before the owning note is sent.
    async fn upload_media(&mut self, note: &Note) -> Result<()> {
        for media in &note.media {
            if self.state.added_media.contains(&media.filename) {
                continue;
            }
            self.client.store_media_file(media).await?;
            tracing::debug!(filename = %media.filename, "Uploaded media");
            self.state.added_media.insert(media.filename.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
