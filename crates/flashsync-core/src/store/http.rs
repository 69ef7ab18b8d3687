//! HTTP transport for a local AnkiConnect listener.

use serde_json::Value;

use super::{StoreError, Transport};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::util::compact_text;

/// Posts envelopes to the configured endpoint with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|error| Error::Config(format!("Failed to construct HTTP client: {error}")))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    async fn post(&self, envelope: &Value) -> std::result::Result<Value, StoreError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(envelope)
            .send()
            .await
            .map_err(|error| StoreError::Unreachable(format!("{}: {error}", self.endpoint)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Malformed(format!(
                "store replied with HTTP {status}: {}",
                compact_text(&body)
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|error| StoreError::Malformed(format!("response is not valid JSON: {error}")))
    }
}
