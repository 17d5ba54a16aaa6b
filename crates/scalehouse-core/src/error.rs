//! Domain error types.

use thiserror::Error;

/// Errors produced while interpreting persisted or wire-level domain data.
///
/// These show up when a database row or remote payload carries a value the
/// domain model does not recognize (corrupt column, unknown enum string).
#[derive(Debug, Error)]
pub enum CoreError {
    /// A leg type string was neither empty nor a known value.
    #[error("unknown leg type: '{0}'")]
    InvalidLegType(String),

    /// A sync status column held something other than 0 or 1.
    #[error("invalid sync status value: {0}")]
    InvalidSyncState(i64),

    /// A document number did not match `<prefix>-<sequence>`.
    #[error("malformed document number: '{0}'")]
    InvalidDocumentNumber(String),

    /// A JSON column (logs, correction trail) failed to deserialize.
    #[error("invalid embedded JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
