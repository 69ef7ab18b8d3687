use std::path::Path;

use flashsync_core::parser::parse_document;
use serde::Serialize;

use crate::cli::GlobalArgs;
use crate::commands::common::{
    fault_to_item, format_parsed_note_lines, load_state, parsed_note_to_item, resolve_context,
    ParseFaultItem, ParsedNoteItem,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ParseOutput {
    notes: Vec<ParsedNoteItem>,
    faults: Vec<ParseFaultItem>,
    deletions: Vec<u64>,
}

pub fn run_parse(global: &GlobalArgs, file: &Path, as_json: bool) -> Result<(), CliError> {
    let context = resolve_context(global)?;
    let state = load_state(&context.state_path)?;
    let text = std::fs::read_to_string(file)?;
    let parsed = parse_document(&text, &state.settings);

    if as_json {
        let output = ParseOutput {
            notes: parsed.notes.iter().map(parsed_note_to_item).collect(),
            faults: parsed.faults.iter().map(fault_to_item).collect(),
            deletions: parsed.deletions.iter().map(|id| id.get()).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if state.settings.fields.is_empty() {
        println!("No categories known yet; run `flashsync regenerate` first.");
    }
    if parsed.notes.is_empty() {
        println!("No notes found.");
    }
    for line in format_parsed_note_lines(&parsed.notes) {
        println!("{line}");
    }
    for id in &parsed.deletions {
        println!("delete  {id}");
    }
    for fault in &parsed.faults {
        println!("parse error at {fault}");
    }
    for category in &parsed.unknown_categories {
        println!("unknown category: {category}");
    }
    Ok(())
}
