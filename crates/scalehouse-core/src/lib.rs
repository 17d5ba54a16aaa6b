//! # scalehouse-core
//!
//! Pure domain logic for the weighbridge edge agent.
//!
//! This crate holds everything that can be computed without touching a
//! database, a serial port, or the network: the reading types, the weighing
//! transaction model, the signal stabilizer state machine, document number
//! rules, and input validation. All side effects live in the sibling crates.

pub mod document;
pub mod error;
pub mod stabilizer;
pub mod types;
pub mod validation;
pub mod weights;

pub use document::{format_document_number, next_sequence, parse_sequence, DocumentPrefix};
pub use error::CoreError;
pub use stabilizer::{parse_line, Stabilizer, StabilizerConfig};
pub use types::{
    format_wire_datetime, Leg, LegType, LogEntry, ReferenceKind, ScaleStatus, SyncState,
    Transaction, TransactionDraft, TransactionUpdate, WeightReading, WIRE_DATETIME_FORMAT,
};
pub use weights::{compute_totals, WeightStamp, WeightTotals};

/// Floor value for document number sequences: the first number issued under
/// a fresh prefix is `FLOOR + 1` (e.g. `A-1001`).
pub const SEQUENCE_FLOOR: i64 = 1000;

/// Number of consecutive qualifying stable reads required before a reading
/// is trusted and emitted.
pub const STABILITY_THRESHOLD: u32 = 6;

/// Maximum number of transactions pushed to the remote authority per cycle.
pub const PUSH_BATCH_SIZE: u32 = 10;
