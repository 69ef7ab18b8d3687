use crate::cli::{GlobalArgs, SettingsCommands};
use crate::commands::common::{load_state, resolve_context, Context};
use crate::error::CliError;

pub fn run_settings(global: &GlobalArgs, command: SettingsCommands) -> Result<(), CliError> {
    let context = resolve_context(global)?;
    apply_settings_command(&context, command)
}

#[allow(clippy::needless_pass_by_value)]
pub fn apply_settings_command(context: &Context, command: SettingsCommands) -> Result<(), CliError> {
    let mut state = load_state(&context.state_path)?;

    match command {
        SettingsCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&state.settings)?);
            return Ok(());
        }
        SettingsCommands::SetRegexp { category, pattern } => {
            state.settings.set_custom_regexp(&category, &pattern)?;
            println!("Custom pattern for {category} updated");
        }
        SettingsCommands::SetSyntax { key, value } => {
            state.settings.syntax.set(&key, &value)?;
            println!("{key} set to {value}");
        }
        SettingsCommands::SetDefault { key, value } => {
            state.settings.defaults.set(&key, &value)?;
            println!("{key} set to {}", value.trim());
        }
    }

    state.save(&context.state_path)?;
    Ok(())
}
