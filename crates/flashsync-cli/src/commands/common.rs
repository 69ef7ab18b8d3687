use std::env;
use std::path::{Path, PathBuf};

use flashsync_core::config::StoreConfig;
use flashsync_core::parser::{ParseFault, ParsedNote};
use flashsync_core::state::SyncState;
use flashsync_core::store::{HttpTransport, StoreClient};
use flashsync_core::sync::{DocumentReport, EngineOptions, SyncEngine};
use flashsync_core::vault::Vault;
use serde::Serialize;

use crate::cli::GlobalArgs;
use crate::config::{normalize_text_option, CliConfig};
use crate::error::CliError;

pub const STORE_URL_ENV: &str = "FLASHSYNC_STORE_URL";
pub const VAULT_ENV: &str = "FLASHSYNC_VAULT";

const PREVIEW_LENGTH: usize = 60;

/// Resolved locations for one command run.
#[derive(Debug)]
pub struct Context {
    pub vault: Vault,
    pub state_path: PathBuf,
    pub store: StoreConfig,
}

#[derive(Debug, Serialize)]
pub struct ParsedNoteItem {
    pub line: usize,
    pub form: &'static str,
    pub category: String,
    pub deck: String,
    pub id: Option<u64>,
    pub fields: Vec<(String, String)>,
    pub tags: Vec<String>,
    pub frozen_fields: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ParseFaultItem {
    pub line: usize,
    pub message: String,
}

/// First non-empty value among a flag, an env var and the config file.
pub fn resolve_value(
    explicit: Option<String>,
    from_env: Option<String>,
    from_config: Option<String>,
) -> Option<String> {
    normalize_text_option(explicit)
        .or_else(|| normalize_text_option(from_env))
        .or_else(|| normalize_text_option(from_config))
}

pub fn default_state_path(vault_root: &Path) -> PathBuf {
    vault_root.join(".flashsync").join("data.json")
}

pub fn resolve_context(global: &GlobalArgs) -> Result<Context, CliError> {
    let config = CliConfig::load().map_err(CliError::Config)?;
    resolve_context_with(global, &config)
}

pub fn resolve_context_with(global: &GlobalArgs, config: &CliConfig) -> Result<Context, CliError> {
    let vault_dir = resolve_value(
        global.vault.as_ref().map(|path| path.display().to_string()),
        env::var(VAULT_ENV).ok(),
        config.vault.clone(),
    )
    .map_or_else(env::current_dir, |dir| Ok(PathBuf::from(dir)))?;
    let vault = Vault::open(vault_dir)?;

    let state_path = resolve_value(
        global.state.as_ref().map(|path| path.display().to_string()),
        None,
        config.state_path.clone(),
    )
    .map_or_else(|| default_state_path(vault.root()), PathBuf::from);

    let store = StoreConfig::with_endpoint(resolve_value(
        global.store_url.clone(),
        env::var(STORE_URL_ENV).ok(),
        config.store_url.clone(),
    ))?;

    Ok(Context {
        vault,
        state_path,
        store,
    })
}

/// Saved state, or fresh default settings when nothing was saved yet.
pub fn load_state(path: &Path) -> Result<SyncState, CliError> {
    Ok(SyncState::load(path)?.unwrap_or_default())
}

pub fn open_engine(context: &Context, state: SyncState) -> Result<SyncEngine<HttpTransport>, CliError> {
    let transport = HttpTransport::new(&context.store)?;
    let options = EngineOptions {
        vault_root: context.vault.root().to_path_buf(),
        vault_name: context.vault.name(),
    };
    Ok(SyncEngine::new(StoreClient::new(transport), state, options))
}

pub fn parsed_note_to_item(parsed: &ParsedNote) -> ParsedNoteItem {
    let note = &parsed.note;
    ParsedNoteItem {
        line: parsed.line,
        form: parsed.form.as_str(),
        category: note.category.clone(),
        deck: note.deck.clone(),
        id: note.id.map(|id| id.get()),
        fields: note
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        tags: note.tags.iter().cloned().collect(),
        frozen_fields: parsed.frozen_fields.iter().cloned().collect(),
    }
}

pub fn fault_to_item(fault: &ParseFault) -> ParseFaultItem {
    ParseFaultItem {
        line: fault.line,
        message: fault.message.clone(),
    }
}

pub fn format_parsed_note_lines(notes: &[ParsedNote]) -> Vec<String> {
    notes
        .iter()
        .map(|parsed| {
            let note = &parsed.note;
            let id = note
                .id
                .map_or_else(|| "new".to_string(), |id| id.to_string());
            let preview: String = note
                .fields
                .values()
                .find(|content| !content.trim().is_empty())
                .and_then(|content| content.lines().next())
                .unwrap_or_default()
                .trim()
                .chars()
                .take(PREVIEW_LENGTH)
                .collect();
            format!(
                "{:>4}  {:<6}  {:<14}  {}  [{}]  {preview}",
                parsed.line,
                parsed.form.as_str(),
                id,
                note.category,
                note.deck,
            )
        })
        .collect()
}

pub fn format_report_lines(report: &DocumentReport) -> Vec<String> {
    if report.up_to_date {
        return vec![format!("{}: up to date", report.path)];
    }
    let mut lines = vec![format!(
        "{}: {} created, {} updated, {} deleted, {} skipped, {} unchanged",
        report.path, report.created, report.updated, report.deleted, report.skipped, report.unchanged
    )];
    lines.extend(
        report
            .faults
            .iter()
            .map(|fault| format!("  parse error at {fault}")),
    );
    lines.extend(
        report
            .failures
            .iter()
            .map(|failure| format!("  {} failed: {}", failure.note, failure.message)),
    );
    if let Some(reason) = &report.aborted {
        lines.push(format!("  aborted: {reason}"));
    }
    lines
}
