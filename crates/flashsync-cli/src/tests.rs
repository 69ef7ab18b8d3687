use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use flashsync_core::models::Settings;
use flashsync_core::parser::parse_document;
use flashsync_core::sync::{DocumentReport, NoteFailure};
use pretty_assertions::assert_eq;

use crate::cli::{Cli, Commands, CompletionShell, ConfigCommands, GlobalArgs, SettingsCommands};
use crate::commands::common::{
    default_state_path, format_parsed_note_lines, format_report_lines, load_state,
    parsed_note_to_item, resolve_context_with, resolve_value,
};
use crate::commands::completions::{render_completions, run_completions};
use crate::commands::settings::apply_settings_command;
use crate::config::CliConfig;

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.regenerate(BTreeMap::from([(
        "Basic".to_string(),
        vec!["Front".to_string(), "Back".to_string()],
    )]));
    settings
}

#[test]
fn resolve_value_prefers_flag_then_env_then_config() {
    assert_eq!(
        resolve_value(
            Some("flag".to_string()),
            Some("env".to_string()),
            Some("config".to_string())
        ),
        Some("flag".to_string())
    );
    assert_eq!(
        resolve_value(
            Some("  ".to_string()),
            Some("env".to_string()),
            Some("config".to_string())
        ),
        Some("env".to_string())
    );
    assert_eq!(
        resolve_value(None, None, Some(" config ".to_string())),
        Some("config".to_string())
    );
    assert_eq!(resolve_value(None, None, None), None);
}

#[test]
fn default_state_path_lives_inside_vault() {
    assert_eq!(
        default_state_path(&PathBuf::from("/vault")),
        PathBuf::from("/vault/.flashsync/data.json")
    );
}

#[test]
fn resolve_context_uses_flags_over_config() {
    let vault = tempfile::tempdir().unwrap();
    let global = GlobalArgs {
        vault: Some(vault.path().to_path_buf()),
        state: None,
        store_url: Some("http://localhost:9999/".to_string()),
    };
    let config = CliConfig {
        store_url: Some("http://ignored:1".to_string()),
        ..CliConfig::default()
    };

    let context = resolve_context_with(&global, &config).unwrap();

    let root = vault.path().canonicalize().unwrap();
    assert_eq!(context.vault.root(), root.as_path());
    assert_eq!(context.state_path, default_state_path(&root));
    assert_eq!(context.store.endpoint, "http://localhost:9999");
}

#[test]
fn resolve_context_reads_state_path_from_config() {
    let vault = tempfile::tempdir().unwrap();
    let state = vault.path().join("custom.json");
    let global = GlobalArgs {
        vault: Some(vault.path().to_path_buf()),
        store_url: Some("http://127.0.0.1:8765".to_string()),
        ..GlobalArgs::default()
    };
    let config = CliConfig {
        state_path: Some(state.display().to_string()),
        ..CliConfig::default()
    };

    let context = resolve_context_with(&global, &config).unwrap();
    assert_eq!(context.state_path, state);
}

#[test]
fn resolve_context_rejects_non_http_store_url() {
    let vault = tempfile::tempdir().unwrap();
    let global = GlobalArgs {
        vault: Some(vault.path().to_path_buf()),
        store_url: Some("ftp://127.0.0.1".to_string()),
        ..GlobalArgs::default()
    };
    assert!(resolve_context_with(&global, &CliConfig::default()).is_err());
}

#[test]
fn load_state_defaults_when_nothing_saved() {
    let dir = tempfile::tempdir().unwrap();
    let state = load_state(&dir.path().join("data.json")).unwrap();
    assert!(state.files.is_empty());
    assert!(state.settings.fields.is_empty());
}

#[test]
fn format_report_lines_for_up_to_date_document() {
    let report = DocumentReport {
        up_to_date: true,
        ..DocumentReport::new("deck/notes.md")
    };
    assert_eq!(format_report_lines(&report), vec!["deck/notes.md: up to date"]);
}

#[test]
fn format_report_lines_lists_failures_and_abort() {
    let report = DocumentReport {
        created: 2,
        updated: 1,
        failures: vec![NoteFailure {
            note: "#555".to_string(),
            message: "Not found: note 555 does not exist in the store".to_string(),
        }],
        aborted: Some("store unreachable".to_string()),
        ..DocumentReport::new("notes.md")
    };

    assert_eq!(
        format_report_lines(&report),
        vec![
            "notes.md: 2 created, 1 updated, 0 deleted, 0 skipped, 0 unchanged",
            "  #555 failed: Not found: note 555 does not exist in the store",
            "  aborted: store unreachable",
        ]
    );
}

#[test]
fn format_report_lines_include_parse_faults() {
    let document = parse_document("START\nBasic\nFront: Q\n", &settings());
    let report = DocumentReport {
        faults: document.faults,
        ..DocumentReport::new("open.md")
    };

    let lines = format_report_lines(&report);
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("  parse error at line 1:"));
}

#[test]
fn parsed_notes_format_and_serialize() {
    let text = "START\nBasic\nFront: Capital of France?\nBack: Paris\n<!--ID: 42-->\nEND\n\nSTARTI Q Back: A ENDI\n";
    let document = parse_document(text, &settings());
    assert_eq!(document.notes.len(), 2);

    let lines = format_parsed_note_lines(&document.notes);
    assert!(lines[0].contains("block"));
    assert!(lines[0].contains("42"));
    assert!(lines[0].contains("[Default]"));
    assert!(lines[1].contains("inline"));
    assert!(lines[1].contains("new"));

    let item = parsed_note_to_item(&document.notes[0]);
    assert_eq!(item.id, Some(42));
    assert_eq!(item.form, "block");
    assert_eq!(
        item.fields,
        vec![
            ("Back".to_string(), "Paris".to_string()),
            ("Front".to_string(), "Capital of France?".to_string()),
        ]
    );
    let json = serde_json::to_value(&item).unwrap();
    assert_eq!(json["category"], "Basic");
    assert_eq!(json["line"], 1);
}

#[test]
fn cli_parses_sync_with_global_flags() {
    let cli = Cli::try_parse_from([
        "flashsync",
        "sync",
        "notes",
        "--force",
        "--store-url",
        "http://localhost:8765",
    ])
    .unwrap();

    assert_eq!(cli.global.store_url.as_deref(), Some("http://localhost:8765"));
    match cli.command {
        Commands::Sync { paths, force } => {
            assert_eq!(paths, vec![PathBuf::from("notes")]);
            assert!(force);
        }
        _ => panic!("expected sync command"),
    }
}

#[test]
fn cli_parses_nested_subcommands() {
    let cli = Cli::try_parse_from(["flashsync", "settings", "set-regexp", "Basic", "^Q: (.+)$"])
        .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Settings {
            command: SettingsCommands::SetRegexp { ref category, .. }
        } if category == "Basic"
    ));

    let cli = Cli::try_parse_from(["flashsync", "--vault", "/tmp/v", "config", "init"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Config {
            command: ConfigCommands::Init
        }
    ));
    assert_eq!(cli.global.vault, Some(PathBuf::from("/tmp/v")));
}

#[test]
fn cli_parses_set_default() {
    let cli = Cli::try_parse_from(["flashsync", "settings", "set-default", "CurlyCloze", "true"])
        .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Settings {
            command: SettingsCommands::SetDefault { ref key, ref value }
        } if key == "CurlyCloze" && value == "true"
    ));
}

#[test]
fn settings_set_default_is_saved_to_state() {
    let vault = tempfile::tempdir().unwrap();
    let global = GlobalArgs {
        vault: Some(vault.path().to_path_buf()),
        state: Some(vault.path().join("state.json")),
        store_url: Some("http://127.0.0.1:8765".to_string()),
    };
    let context = resolve_context_with(&global, &CliConfig::default()).unwrap();

    apply_settings_command(
        &context,
        SettingsCommands::SetDefault {
            key: "Regex".to_string(),
            value: "true".to_string(),
        },
    )
    .unwrap();
    assert!(load_state(&context.state_path).unwrap().settings.defaults.regex);

    let error = apply_settings_command(
        &context,
        SettingsCommands::SetDefault {
            key: "Colour".to_string(),
            value: "blue".to_string(),
        },
    )
    .unwrap_err();
    assert!(error.to_string().contains("Unknown default 'Colour'"));
}

#[test]
fn cli_requires_a_subcommand() {
    assert!(Cli::try_parse_from(["flashsync"]).is_err());
}

#[test]
fn completions_name_the_binary() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("flashsync"));
}

#[test]
fn completions_can_be_written_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flashsync.fish");

    run_completions(CompletionShell::Fish, Some(&path)).unwrap();

    let script = std::fs::read_to_string(&path).unwrap();
    assert!(script.contains("flashsync"));
}
