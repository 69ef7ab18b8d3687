use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use super::*;
use crate::models::Settings;
use crate::store::StoreError;

/// In-memory store that answers like AnkiConnect and records every call.
#[derive(Default)]
struct RecordingStore {
    calls: RefCell<Vec<(String, Value)>>,
    next_id: Cell<u64>,
    notes: RefCell<BTreeSet<u64>>,
    duplicates: Cell<bool>,
    offline: Cell<bool>,
    reject: RefCell<Option<String>>,
}

impl RecordingStore {
    fn starting_at(first_id: u64) -> Self {
        let store = Self::default();
        store.next_id.set(first_id);
        store
    }

    fn actions(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(action, _)| action.clone())
            .collect()
    }

    fn params_of(&self, action: &str) -> Vec<Value> {
        self.calls
            .borrow()
            .iter()
            .filter(|(name, _)| name == action)
            .map(|(_, params)| params.clone())
            .collect()
    }

    fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl Transport for RecordingStore {
    async fn post(&self, envelope: &Value) -> std::result::Result<Value, StoreError> {
        if self.offline.get() {
            return Err(StoreError::Unreachable("connection refused".to_string()));
        }
        let action = envelope["action"].as_str().unwrap_or_default().to_string();
        let params = envelope["params"].clone();
        self.calls.borrow_mut().push((action.clone(), params.clone()));

        if self.reject.borrow().as_deref() == Some(action.as_str()) {
            return Ok(json!({ "result": null, "error": format!("{action} rejected") }));
        }
        let result = match action.as_str() {
            "modelNames" => json!(["Basic", "Cloze"]),
            "modelFieldNames" => match params["modelName"].as_str() {
                Some("Cloze") => json!(["Text", "Back Extra"]),
                _ => json!(["Front", "Back"]),
            },
            "canAddNotes" => {
                let count = params["notes"].as_array().map_or(0, Vec::len);
                json!(vec![!self.duplicates.get(); count])
            }
            "addNote" => {
                let id = self.next_id.get();
                self.next_id.set(id + 1);
                self.notes.borrow_mut().insert(id);
                json!(id)
            }
            "notesInfo" => {
                let notes = self.notes.borrow();
                let infos: Vec<Value> = params["notes"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_u64)
                    .map(|id| {
                        if notes.contains(&id) {
                            json!({ "noteId": id, "cards": [id * 10] })
                        } else {
                            json!({})
                        }
                    })
                    .collect();
                json!(infos)
            }
            "deleteNotes" => {
                let mut notes = self.notes.borrow_mut();
                for id in params["notes"].as_array().into_iter().flatten() {
                    if let Some(id) = id.as_u64() {
                        notes.remove(&id);
                    }
                }
                Value::Null
            }
            "storeMediaFile" => params["filename"].clone(),
            _ => Value::Null,
        };
        Ok(json!({ "result": result, "error": null }))
    }
}

#[derive(Default)]
struct MemorySink {
    documents: BTreeMap<String, String>,
}

impl DocumentSink for MemorySink {
    fn write_document(&mut self, path: &str, contents: &str) -> Result<()> {
        self.documents.insert(path.to_string(), contents.to_string());
        Ok(())
    }
}

fn seeded_settings() -> Settings {
    let mut settings = Settings::default();
    settings.regenerate(BTreeMap::from([
        (
            "Basic".to_string(),
            vec!["Front".to_string(), "Back".to_string()],
        ),
        (
            "Cloze".to_string(),
            vec!["Text".to_string(), "Back Extra".to_string()],
        ),
    ]));
    settings
}

fn options(root: PathBuf) -> EngineOptions {
    EngineOptions {
        vault_root: root,
        vault_name: "Vault".to_string(),
    }
}

fn engine_with(store: &RecordingStore, state: SyncState) -> SyncEngine<&RecordingStore> {
    SyncEngine::new(
        StoreClient::new(store),
        state,
        options(PathBuf::from("/nonexistent-vault")),
    )
}

fn engine(store: &RecordingStore) -> SyncEngine<&RecordingStore> {
    engine_with(store, SyncState::new(seeded_settings()))
}

fn ids(values: &[u64]) -> BTreeSet<NoteId> {
    values.iter().copied().map(NoteId::new).collect()
}

const TWO_NOTES: &str = "START\nBasic\nFront: one\nBack: 1\nEND\n\nSTART\nBasic\nFront: two\nBack: 2\nEND\n";

const TWO_NOTES_SYNCED: &str = "START\nBasic\nFront: one\nBack: 1\n<!--ID: 101-->\nEND\n\nSTART\nBasic\nFront: two\nBack: 2\n<!--ID: 102-->\nEND\n";

/// Sync `TWO_NOTES` once so the store holds notes 101 and 102.
async fn synced_pair(store: &RecordingStore) -> SyncEngine<&RecordingStore> {
    let mut engine = engine(store);
    let mut sink = MemorySink::default();
    engine
        .sync_document("deck.md", TWO_NOTES, false, &mut sink)
        .await
        .unwrap();
    store.clear();
    engine
}

#[tokio::test(flavor = "current_thread")]
async fn first_sync_creates_notes_and_writes_ids_back() {
    let store = RecordingStore::starting_at(101);
    let mut engine = engine(&store);
    let mut sink = MemorySink::default();

    let report = engine
        .sync_document("deck.md", TWO_NOTES, false, &mut sink)
        .await
        .unwrap();

    assert_eq!(report.created, 2);
    assert!(report.is_clean());
    assert_eq!(
        store.actions(),
        vec!["canAddNotes", "addNote", "canAddNotes", "addNote"]
    );
    assert_eq!(sink.documents["deck.md"], TWO_NOTES_SYNCED);

    let file = engine.state().file("deck.md").unwrap();
    assert_eq!(file.note_ids(), ids(&[101, 102]));
    assert_eq!(file.content_hash, Some(content_hash(TWO_NOTES_SYNCED)));
    assert_eq!(file.notes[&NoteId::new(101)].fields["Front"], "one");
}

#[tokio::test(flavor = "current_thread")]
async fn unchanged_document_makes_no_calls() {
    let store = RecordingStore::starting_at(101);
    let mut engine = synced_pair(&store).await;
    let mut sink = MemorySink::default();

    let report = engine
        .sync_document("deck.md", TWO_NOTES_SYNCED, false, &mut sink)
        .await
        .unwrap();

    assert!(report.up_to_date);
    assert!(store.actions().is_empty());
    assert!(sink.documents.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn edited_field_updates_only_that_note() {
    let store = RecordingStore::starting_at(101);
    let mut engine = synced_pair(&store).await;
    let mut sink = MemorySink::default();
    let edited = TWO_NOTES_SYNCED.replace("Back: 2", "Back: 22");

    let report = engine
        .sync_document("deck.md", &edited, false, &mut sink)
        .await
        .unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(store.actions(), vec!["updateNote"]);
    assert_eq!(store.params_of("updateNote")[0]["note"]["id"], 102);
    assert_eq!(store.params_of("updateNote")[0]["note"]["fields"]["Back"], "22");

    let file = engine.state().file("deck.md").unwrap();
    assert_eq!(file.content_hash, Some(content_hash(&edited)));
    assert_ne!(file.content_hash, Some(content_hash(TWO_NOTES_SYNCED)));
}

#[tokio::test(flavor = "current_thread")]
async fn removed_note_is_deleted() {
    let store = RecordingStore::starting_at(101);
    let mut engine = synced_pair(&store).await;
    let mut sink = MemorySink::default();
    let edited = "START\nBasic\nFront: one\nBack: 1\n<!--ID: 101-->\nEND\n";

    let report = engine
        .sync_document("deck.md", edited, false, &mut sink)
        .await
        .unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(store.actions(), vec!["deleteNotes"]);
    assert_eq!(store.params_of("deleteNotes")[0], json!({ "notes": [102] }));
    assert_eq!(engine.state().file("deck.md").unwrap().note_ids(), ids(&[101]));
}

#[tokio::test(flavor = "current_thread")]
async fn force_resyncs_unchanged_document_without_updates() {
    let store = RecordingStore::starting_at(101);
    let mut engine = synced_pair(&store).await;
    let mut sink = MemorySink::default();

    let report = engine
        .sync_document("deck.md", TWO_NOTES_SYNCED, true, &mut sink)
        .await
        .unwrap();

    assert!(!report.up_to_date);
    assert_eq!(report.unchanged, 2);
    assert!(store.actions().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn duplicates_are_skipped_not_failed() {
    let store = RecordingStore::starting_at(1);
    store.duplicates.set(true);
    let mut engine = engine(&store);
    let mut sink = MemorySink::default();

    let report = engine
        .sync_document("deck.md", "STARTI Hello Back: World ENDI\n", false, &mut sink)
        .await
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert!(report.is_clean());
    assert_eq!(store.actions(), vec!["canAddNotes"]);
    assert!(sink.documents.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn allowed_duplicates_skip_the_duplicate_query() {
    let store = RecordingStore::starting_at(1);
    let mut settings = seeded_settings();
    settings.defaults.allow_duplicates = true;
    let mut engine = engine_with(&store, SyncState::new(settings));
    let mut sink = MemorySink::default();

    engine
        .sync_document("deck.md", "STARTI Hello Back: World ENDI\n", false, &mut sink)
        .await
        .unwrap();

    assert_eq!(store.actions(), vec!["addNote"]);
    assert_eq!(store.params_of("addNote")[0]["note"]["options"]["allowDuplicate"], true);
    assert_eq!(
        sink.documents["deck.md"],
        "STARTI Hello Back: World <!--ID: 1--> ENDI\n"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn failed_note_does_not_stop_the_others() {
    let store = RecordingStore::starting_at(7);
    let mut engine = engine(&store);
    let mut sink = MemorySink::default();
    let text = "STARTI New Back: card ENDI\nSTART\nBasic\nFront: gone\n<!--ID: 555-->\nEND\n";

    let report = engine
        .sync_document("deck.md", text, false, &mut sink)
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].note, "#555");
    assert_eq!(
        report.failures[0].message,
        "Not found: note 555 does not exist in the store"
    );
    assert_eq!(store.actions(), vec!["canAddNotes", "addNote", "notesInfo"]);

    let file = engine.state().file("deck.md").unwrap();
    assert_eq!(file.content_hash, None);
    assert_eq!(file.note_ids(), ids(&[7]));
}

#[tokio::test(flavor = "current_thread")]
async fn remote_errors_are_reported_verbatim() {
    let store = RecordingStore::starting_at(1);
    store.reject.replace(Some("addNote".to_string()));
    let mut engine = engine(&store);
    let mut sink = MemorySink::default();

    let report = engine
        .sync_document("deck.md", "STARTI Hello Back: World ENDI\n", false, &mut sink)
        .await
        .unwrap();

    assert_eq!(report.failures[0].message, "addNote rejected");
    assert!(sink.documents.is_empty());
    assert_eq!(engine.state().file("deck.md").unwrap().content_hash, None);
}

#[tokio::test(flavor = "current_thread")]
async fn unreachable_store_aborts_the_document() {
    let store = RecordingStore::starting_at(1);
    store.offline.set(true);
    let mut engine = engine(&store);
    let mut sink = MemorySink::default();

    let report = engine
        .sync_document("deck.md", TWO_NOTES, false, &mut sink)
        .await
        .unwrap();

    assert!(report.aborted.is_some());
    assert_eq!(report.created, 0);
    assert!(report.failures.is_empty());
    assert!(sink.documents.is_empty());
    assert_eq!(engine.state().file("deck.md").unwrap().content_hash, None);
}

#[tokio::test(flavor = "current_thread")]
async fn media_is_uploaded_once_before_the_note() {
    let vault = tempfile::tempdir().unwrap();
    std::fs::write(vault.path().join("cat.png"), b"png").unwrap();
    let store = RecordingStore::starting_at(1);
    let mut engine = SyncEngine::new(
        StoreClient::new(&store),
        SyncState::new(seeded_settings()),
        options(vault.path().to_path_buf()),
    );
    let mut sink = MemorySink::default();

    engine
        .sync_document("a.md", "STARTI Look Back: ![[cat.png]] ENDI\n", false, &mut sink)
        .await
        .unwrap();
    assert_eq!(store.actions(), vec!["canAddNotes", "storeMediaFile", "addNote"]);
    assert_eq!(store.params_of("storeMediaFile")[0]["filename"], "cat.png");

    store.clear();
    engine
        .sync_document("b.md", "STARTI Again Back: ![[cat.png]] ENDI\n", false, &mut sink)
        .await
        .unwrap();
    assert_eq!(store.actions(), vec!["canAddNotes", "addNote"]);
    assert!(engine.state().added_media.contains("cat.png"));
}

#[tokio::test(flavor = "current_thread")]
async fn unknown_category_regenerates_once_and_reparses() {
    let store = RecordingStore::starting_at(1);
    let mut settings = Settings::default();
    settings.regenerate(BTreeMap::from([(
        "Basic".to_string(),
        vec!["Front".to_string(), "Back".to_string()],
    )]));
    let mut engine = engine_with(&store, SyncState::new(settings));
    let mut sink = MemorySink::default();

    let report = engine
        .sync_document(
            "deck.md",
            "START\nCloze\nText: {{c1::Paris}} is in France\nEND\n",
            false,
            &mut sink,
        )
        .await
        .unwrap();

    assert_eq!(report.created, 1);
    assert!(report.is_clean());
    assert_eq!(
        store.actions(),
        vec!["modelNames", "modelFieldNames", "modelFieldNames", "canAddNotes", "addNote"]
    );
    assert!(engine.state().settings.fields_for("Cloze").is_some());
}

#[tokio::test(flavor = "current_thread")]
async fn delete_directive_removes_note() {
    let store = RecordingStore::starting_at(1);
    let mut engine = engine(&store);
    let mut sink = MemorySink::default();

    let report = engine
        .sync_document("deck.md", "DELETE\n<!--ID: 9-->\n", false, &mut sink)
        .await
        .unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(store.params_of("deleteNotes")[0], json!({ "notes": [9] }));
}

fn recorded_state(deck: &str, back: &str) -> SyncState {
    let mut state = SyncState::new(seeded_settings());
    let recorded = RecordedNote {
        deck: deck.to_string(),
        fields: BTreeMap::from([
            ("Front".to_string(), "q".to_string()),
            ("Back".to_string(), back.to_string()),
        ]),
        tags: BTreeSet::from(["Obsidian_to_Anki".to_string()]),
    };
    state.files.insert(
        "deck.md".to_string(),
        FileState {
            content_hash: None,
            notes: BTreeMap::from([(NoteId::new(101), recorded)]),
        },
    );
    state
}

#[tokio::test(flavor = "current_thread")]
async fn frozen_fields_keep_recorded_value() {
    let store = RecordingStore::starting_at(1);
    let mut engine = engine_with(&store, recorded_state("Default", "old"));
    let mut sink = MemorySink::default();
    let text = "FROZEN\nBack\nSTART\nBasic\nFront: q2\nBack: new\n<!--ID: 101-->\nEND\n";

    engine
        .sync_document("deck.md", text, false, &mut sink)
        .await
        .unwrap();

    assert_eq!(store.actions(), vec!["updateNote"]);
    let fields = &store.params_of("updateNote")[0]["note"]["fields"];
    assert_eq!(fields["Front"], "q2");
    assert_eq!(fields["Back"], "old");
}

#[tokio::test(flavor = "current_thread")]
async fn deck_change_moves_cards() {
    let store = RecordingStore::starting_at(1);
    store.notes.borrow_mut().insert(101);
    let mut engine = engine_with(&store, recorded_state("Default", "a"));
    let mut sink = MemorySink::default();
    let text = "TARGET DECK\nGeo\nSTART\nBasic\nFront: q\nBack: a\n<!--ID: 101-->\nEND\n";

    let report = engine
        .sync_document("deck.md", text, false, &mut sink)
        .await
        .unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(store.actions(), vec!["updateNote", "notesInfo", "changeDeck"]);
    assert_eq!(
        store.params_of("changeDeck")[0],
        json!({ "cards": [1010], "deck": "Geo" })
    );
    assert_eq!(
        engine.state().file("deck.md").unwrap().notes[&NoteId::new(101)].deck,
        "Geo"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn file_link_is_appended_to_first_field() {
    let store = RecordingStore::starting_at(1);
    let mut settings = seeded_settings();
    settings.defaults.add_file_link = true;
    let mut engine = SyncEngine::new(
        StoreClient::new(&store),
        SyncState::new(settings),
        EngineOptions {
            vault_root: PathBuf::from("/nonexistent-vault"),
            vault_name: "My Vault".to_string(),
        },
    );
    let mut sink = MemorySink::default();

    engine
        .sync_document("dir/a b.md", "STARTI Q Back: A ENDI\n", false, &mut sink)
        .await
        .unwrap();

    assert_eq!(
        store.params_of("addNote")[0]["note"]["fields"]["Front"],
        "Q<br><a href=\"obsidian://open?vault=My%20Vault&file=dir%2Fa%20b.md\">dir/a b.md</a>"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn bootstrap_regenerates_empty_settings() {
    let store = RecordingStore::starting_at(1);
    let mut engine = engine_with(&store, SyncState::default());

    let changes = engine.bootstrap().await.unwrap().unwrap();

    assert_eq!(changes.added, vec!["Basic".to_string(), "Cloze".to_string()]);
    assert!(engine.bootstrap().await.unwrap().is_none());
}

#[tokio::test(flavor = "current_thread")]
async fn bootstrap_rejects_indistinct_block_tokens_without_calls() {
    let store = RecordingStore::starting_at(1);
    let mut settings = seeded_settings();
    settings.syntax.end_note = settings.syntax.begin_note.clone();
    let mut engine = engine_with(&store, SyncState::new(settings));

    assert!(!engine.state().needs_regeneration());
    assert!(matches!(engine.bootstrap().await, Err(Error::Config(_))));
    assert!(store.actions().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn missing_end_keeps_notes_swallowed_by_the_open_block() {
    let store = RecordingStore::starting_at(101);
    let mut engine = engine(&store);
    let mut sink = MemorySink::default();
    let text = "START\nBasic\nFront: one\nBack: 1\nEND\nSTARTI Q Back: A ENDI\n";
    engine
        .sync_document("deck.md", text, false, &mut sink)
        .await
        .unwrap();
    store.clear();
    let broken = sink.documents["deck.md"].replacen("END\n", "", 1);
    assert!(broken.contains("<!--ID: 102--> ENDI"));

    let report = engine
        .sync_document("deck.md", &broken, false, &mut sink)
        .await
        .unwrap();

    assert_eq!(report.faults.len(), 1);
    assert_eq!(report.deleted, 0);
    assert!(store.actions().is_empty());
    let file = engine.state().file("deck.md").unwrap();
    assert_eq!(file.note_ids(), ids(&[101, 102]));
    assert_eq!(file.content_hash, None);
}

#[tokio::test(flavor = "current_thread")]
async fn invalid_custom_pattern_keeps_recorded_notes() {
    let store = RecordingStore::starting_at(1);
    let mut state = recorded_state("Default", "1");
    state.settings.defaults.regex = true;
    state
        .settings
        .custom_regexps
        .insert("Basic".to_string(), r"^Q: (.+\nA: (.+)$".to_string());
    let mut engine = engine_with(&store, state);
    let mut sink = MemorySink::default();

    let report = engine
        .sync_document("deck.md", "Q: q\nA: 1\n<!--ID: 101-->\n", false, &mut sink)
        .await
        .unwrap();

    assert_eq!(report.faults.len(), 1);
    assert!(report.faults[0].message.starts_with("invalid pattern for category 'Basic'"));
    assert_eq!(report.deleted, 0);
    assert!(store.actions().is_empty());
    assert_eq!(engine.state().file("deck.md").unwrap().note_ids(), ids(&[101]));
}

#[tokio::test(flavor = "current_thread")]
async fn emptied_note_is_not_deleted() {
    let store = RecordingStore::starting_at(1);
    let mut engine = engine_with(&store, recorded_state("Default", "1"));
    let mut sink = MemorySink::default();

    let report = engine
        .sync_document("deck.md", "START\nBasic\n<!--ID: 101-->\nEND\n", false, &mut sink)
        .await
        .unwrap();

    assert_eq!(report.faults.len(), 1);
    assert_eq!(report.deleted, 0);
    assert!(store.actions().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn delete_directive_still_runs_when_the_document_has_faults() {
    let store = RecordingStore::starting_at(1);
    let mut engine = engine_with(&store, recorded_state("Default", "1"));
    let mut sink = MemorySink::default();
    let text = "DELETE\n<!--ID: 9-->\nSTART\nBasic\nFront: open\n";

    let report = engine
        .sync_document("deck.md", text, false, &mut sink)
        .await
        .unwrap();

    assert_eq!(report.faults.len(), 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(store.params_of("deleteNotes"), vec![json!({ "notes": [9] })]);
    assert_eq!(engine.state().file("deck.md").unwrap().note_ids(), ids(&[101]));
}

struct ReadOnlySink;

impl DocumentSink for ReadOnlySink {
    fn write_document(&mut self, path: &str, _contents: &str) -> Result<()> {
        Err(Error::InvalidInput(format!("{path} is read-only")))
    }
}

#[tokio::test(flavor = "current_thread")]
async fn failed_write_back_still_records_created_notes() {
    let store = RecordingStore::starting_at(101);
    let mut engine = engine(&store);

    let report = engine
        .sync_document("deck.md", TWO_NOTES, false, &mut ReadOnlySink)
        .await
        .unwrap();

    assert_eq!(report.created, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].note, "document");
    assert!(report.failures[0].message.contains("deck.md is read-only"));
    let file = engine.state().file("deck.md").unwrap();
    assert_eq!(file.note_ids(), ids(&[101, 102]));
    assert_eq!(file.content_hash, None);

    store.clear();
    let mut sink = MemorySink::default();
    let report = engine
        .sync_document("deck.md", TWO_NOTES, false, &mut sink)
        .await
        .unwrap();

    assert_eq!(report.unchanged, 2);
    assert_eq!(report.deleted, 0);
    assert!(report.is_clean());
    assert!(store.actions().is_empty());
    assert_eq!(sink.documents["deck.md"], TWO_NOTES_SYNCED);
    assert_eq!(
        engine.state().file("deck.md").unwrap().content_hash,
        Some(content_hash(TWO_NOTES_SYNCED))
    );
}
