//! # Sync Error Types
//!
//! Errors for remote API calls, sync activities, and the broker session.
//!
//! Sync runs in the background: nothing here ever reaches the operator as a
//! hard failure. The orchestrator folds every error into the recorded
//! per-activity status and the next cycle tries again.

use thiserror::Error;

use scalehouse_db::DbError;
use scalehouse_store::StoreError;

/// Sync operation errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP transport failure (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with a non-success status.
    #[error("remote returned HTTP {status} for {operation}")]
    RemoteRejected { status: u16, operation: String },

    /// Response body did not match the expected shape.
    #[error("malformed remote response: {0}")]
    MalformedResponse(String),

    /// Local ledger failure during sync.
    #[error(transparent)]
    Db(#[from] DbError),

    /// State store failure during sync.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Broker session failure.
    #[error("broker error: {0}")]
    Broker(String),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
