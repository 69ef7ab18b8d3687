//! Error types for flashsync-core

use thiserror::Error;

use crate::parser::ParseFault;
use crate::store::StoreError;

/// Result type alias using flashsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in flashsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed note syntax in a document
    #[error("Parse error: {0}")]
    Parse(#[from] ParseFault),

    /// Store protocol or transport failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Settings incompatible with the store's category list
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid custom regexp
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Note id unknown to the store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the store could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_unreachable())
    }
}
