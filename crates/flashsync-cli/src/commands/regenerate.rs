use crate::cli::GlobalArgs;
use crate::commands::common::{load_state, open_engine, resolve_context};
use crate::error::CliError;

pub async fn run_regenerate(global: &GlobalArgs) -> Result<(), CliError> {
    let context = resolve_context(global)?;
    let state = load_state(&context.state_path)?;
    let mut engine = open_engine(&context, state)?;

    let changes = engine.regenerate().await?;
    let categories = engine.state().settings.fields.len();
    engine.into_state().save(&context.state_path)?;

    if changes.is_empty() {
        println!("Category table up to date ({categories} categories)");
        return Ok(());
    }
    for category in &changes.added {
        println!("+ {category}");
    }
    for category in &changes.removed {
        println!("- {category}");
    }
    Ok(())
}
