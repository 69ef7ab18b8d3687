//! flashsync CLI - sync flashcards written in Markdown with a local flashcard store

mod cli;
mod commands;
mod config;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::parse::run_parse;
use crate::commands::regenerate::run_regenerate;
use crate::commands::settings::run_settings;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let directive = if cli.verbose {
        "flashsync=debug"
    } else {
        "flashsync=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().expect("Invalid log directive")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sync { paths, force } => run_sync(&cli.global, &paths, force).await?,
        Commands::Parse { file, json } => run_parse(&cli.global, &file, json)?,
        Commands::Regenerate => run_regenerate(&cli.global).await?,
        Commands::Settings { command } => run_settings(&cli.global, command)?,
        Commands::Config { command } => run_config(command, &cli.global)?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
