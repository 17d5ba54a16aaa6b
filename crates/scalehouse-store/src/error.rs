//! Error types for the state store and configuration files.

use thiserror::Error;

/// Store and configuration errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File could not be read or written.
    #[error("store I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Document on disk is not valid JSON for the expected shape.
    #[error("malformed store document at {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// The store actor is no longer running.
    #[error("state store is closed")]
    Closed,
}

impl StoreError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
