use std::path::PathBuf;

use flashsync_core::sync::{DocumentReport, RunSummary};

use crate::cli::GlobalArgs;
use crate::commands::common::{format_report_lines, load_state, open_engine, resolve_context};
use crate::error::CliError;

pub async fn run_sync(global: &GlobalArgs, paths: &[PathBuf], force: bool) -> Result<(), CliError> {
    let mut context = resolve_context(global)?;
    let state = load_state(&context.state_path)?;
    let mut engine = open_engine(&context, state)?;

    let version = engine
        .client()
        .version()
        .await
        .map_err(flashsync_core::Error::from)?;
    tracing::debug!(version, endpoint = %context.store.endpoint, "Connected to store");

    if let Some(changes) = engine.bootstrap().await? {
        println!(
            "Category table regenerated ({} added, {} removed)",
            changes.added.len(),
            changes.removed.len()
        );
    }

    let documents = context.vault.collect_documents(paths)?;
    let mut reports: Vec<DocumentReport> = Vec::with_capacity(documents.len());
    let mut errored = 0;
    for document in &documents {
        let key = match context.vault.document_key(document) {
            Ok(key) => key,
            Err(error) => {
                tracing::error!(path = %document.display(), %error, "Skipping document");
                errored += 1;
                continue;
            }
        };
        let text = match context.vault.read_document(&key) {
            Ok(text) => text,
            Err(error) => {
                tracing::error!(path = %key, %error, "Failed to read document");
                errored += 1;
                continue;
            }
        };

        match engine
            .sync_document(&key, &text, force, &mut context.vault)
            .await
        {
            Ok(report) => {
                for line in format_report_lines(&report) {
                    println!("{line}");
                }
                let aborted = report.aborted.is_some();
                reports.push(report);
                if aborted {
                    tracing::warn!("Store became unreachable; stopping the run");
                    break;
                }
            }
            Err(error) => {
                tracing::error!(path = %key, %error, "Failed to sync document");
                errored += 1;
            }
        }
    }

    engine.into_state().save(&context.state_path)?;

    let summary: RunSummary = reports.iter().collect();
    println!("{summary}");

    let troubled = errored + reports.iter().filter(|report| !report.is_clean()).count();
    if troubled > 0 {
        return Err(CliError::Incomplete(troubled));
    }
    Ok(())
}
