//! Agent-level error type, the last stop before the operator.

use thiserror::Error;

use scalehouse_db::DbError;
use scalehouse_serial::SerialError;
use scalehouse_store::StoreError;
use scalehouse_sync::SyncError;

/// Errors surfaced by the control plane.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Input rejected; one message per problem, in field order.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Serial(#[from] SerialError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Result type for control plane operations.
pub type AgentResult<T> = Result<T, AgentError>;
