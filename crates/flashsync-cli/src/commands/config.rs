use flashsync_core::config::normalize_endpoint;

use crate::cli::{ConfigCommands, GlobalArgs};
use crate::config::{default_config_path, normalize_text_option, CliConfig};
use crate::error::CliError;

#[allow(clippy::needless_pass_by_value)]
pub fn run_config(command: ConfigCommands, global: &GlobalArgs) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init => run_config_init(global),
        ConfigCommands::Show => run_config_show(),
    }
}

fn run_config_init(global: &GlobalArgs) -> Result<(), CliError> {
    let mut config = CliConfig::load().map_err(CliError::Config)?;

    if let Some(url) = normalize_text_option(global.store_url.clone()) {
        config.store_url = Some(normalize_endpoint(&url)?);
    }
    if let Some(vault) = &global.vault {
        let vault = vault.canonicalize().map_err(|error| {
            CliError::Config(format!("Vault {} is not accessible: {error}", vault.display()))
        })?;
        config.vault = Some(vault.display().to_string());
    }
    if let Some(state) = &global.state {
        config.state_path = Some(state.display().to_string());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!("Saved CLI config to {}", path.display());
    Ok(())
}

fn run_config_show() -> Result<(), CliError> {
    let path = default_config_path().map_err(CliError::Config)?;
    let config = CliConfig::load_from_path(&path).map_err(CliError::Config)?;
    println!("{}", path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
