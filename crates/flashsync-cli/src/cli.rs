use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "flashsync")]
#[command(about = "Sync flashcards written in Markdown notes with a local flashcard store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Locations shared by every command; each overrides env vars and the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Vault directory (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub vault: Option<PathBuf>,

    /// Sync state file (defaults to <vault>/.flashsync/data.json)
    #[arg(long, global = true, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Store endpoint (defaults to http://127.0.0.1:8765)
    #[arg(long, global = true, value_name = "URL")]
    pub store_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync Markdown files with the store
    Sync {
        /// Files or directories to sync (the whole vault when omitted)
        paths: Vec<PathBuf>,
        /// Resync files even when they did not change
        #[arg(long)]
        force: bool,
    },
    /// Show the notes found in a file without contacting the store
    Parse {
        /// Markdown file to parse
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Refresh the category table from the store
    Regenerate,
    /// Show or change sync settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print the current settings as JSON
    Show,
    /// Set the custom note pattern of a category (empty pattern disables it)
    SetRegexp {
        /// Category (note type) name
        category: String,
        /// Regular expression; capture groups fill the fields in order
        pattern: String,
    },
    /// Change a syntax token, e.g. `set-syntax "Begin Note" "::card"`
    SetSyntax {
        /// Token name as shown by `settings show`
        key: String,
        value: String,
    },
    /// Change a default, e.g. `set-default Regex true` or `set-default Deck Spanish`
    SetDefault {
        /// Default name as shown by `settings show`
        key: String,
        value: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Save the global --store-url, --vault and --state values as defaults
    Init,
    /// Print the config file location and contents
    Show,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
