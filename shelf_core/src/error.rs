//! Error types for the shelf_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for shelf_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Ingestion payload was empty or could not be parsed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// SQLite statement or transaction failure
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Store could not be reached (poisoned lock, missing parent directory, ...)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures the caller should simply retry on the next polling tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::StorageUnavailable(_))
    }
}
