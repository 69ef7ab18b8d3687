//! Persistent CLI configuration.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use flashsync_core::util::write_atomic;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub store_url: Option<String>,
    #[serde(default)]
    pub vault: Option<String>,
    #[serde(default)]
    pub state_path: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            store_url: None,
            vault: None,
            state_path: None,
        }
    }
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("flashsync").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    flashsync_core::util::normalize_text_option(value)
}

impl CliConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    /// Read the config at `path`; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(error) => return Err(format!("Cannot read {}: {error}", path.display())),
        };
        let mut config: Self = serde_json::from_str(&raw)
            .map_err(|error| format!("Invalid CLI config {}: {error}", path.display()))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Cannot encode CLI config: {error}"))?;
        write_atomic(path, &serialized)
            .map_err(|error| format!("Cannot write {}: {error}", path.display()))
    }

    fn normalize(&mut self) {
        self.store_url = normalize_text_option(self.store_url.take())
            .map(|url| url.trim_end_matches('/').to_string());
        self.vault = normalize_text_option(self.vault.take());
        self.state_path = normalize_text_option(self.state_path.take());
    }
}
