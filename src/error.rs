//! Error definitions for the configuration cache.

use thiserror::Error;

/// Errors that can occur while loading or mutating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The backing store failed during fetch, write or delete.
    #[error("configuration store unavailable: {0}")]
    StoreUnavailable(String),

    /// Persistence file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persistence file contents could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
