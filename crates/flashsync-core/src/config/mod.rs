//! Store endpoint configuration.
//!
//! `StoreConfig` is shared by the CLI and the engine so that every caller
//! validates the endpoint the same way before any request is sent.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Address of a locally running AnkiConnect listener.
pub const DEFAULT_STORE_URL: &str = "http://127.0.0.1:8765";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where and how to reach the flashcard store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_STORE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl StoreConfig {
    /// Build a config for `endpoint`, falling back to the default address.
    pub fn with_endpoint(endpoint: Option<String>) -> Result<Self> {
        let endpoint = match normalize_text_option(endpoint) {
            Some(endpoint) => normalize_endpoint(&endpoint)?,
            None => DEFAULT_STORE_URL.to_string(),
        };
        Ok(Self {
            endpoint,
            ..Self::default()
        })
    }

    #[must_use]
    pub const fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check the endpoint and timeout before use.
    pub fn validate(&self) -> Result<()> {
        normalize_endpoint(&self.endpoint)?;
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "store timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trim an endpoint and strip trailing slashes; only http(s) is accepted.
pub fn normalize_endpoint(value: &str) -> Result<String> {
    let endpoint = value.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        return Err(Error::Config("store endpoint must not be empty".to_string()));
    }
    if !is_http_url(endpoint) {
        return Err(Error::Config(format!(
            "store endpoint must start with http:// or https://: {endpoint}"
        )));
    }
    Ok(endpoint.to_string())
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
