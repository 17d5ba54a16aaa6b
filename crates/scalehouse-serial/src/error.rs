//! Error types for serial acquisition.

use thiserror::Error;

/// Serial acquisition errors.
///
/// Open and read failures inside the acquisition loop are handled by the
/// reconnect logic and never surface here; these errors cover configuration
/// problems and handle misuse.
#[derive(Debug, Error)]
pub enum SerialError {
    /// Unrecognized parity name in the configuration.
    #[error("invalid parity '{0}' (expected none, odd, or even)")]
    InvalidParity(String),

    /// The reader task is no longer running.
    #[error("scale reader is closed")]
    Closed,
}

/// Result type for serial operations.
pub type SerialResult<T> = Result<T, SerialError>;
