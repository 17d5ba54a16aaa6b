//! # Domain Types
//!
//! Core domain types for the weighbridge agent.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  WeightReading  │   │   Transaction   │   │      Leg        │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  status (ST/US) │   │  id             │   │  value          │       │
//! │  │  value (kg)     │   │  document_number│   │  leg_type       │       │
//! │  │  observed_at    │   │  leg1 / leg2    │   │  captured_at    │       │
//! │  └─────────────────┘   │  sync_state     │   └─────────────────┘       │
//! │                        │  logs           │                             │
//! │  ┌─────────────────┐   └─────────────────┘   ┌─────────────────┐       │
//! │  │   ScaleStatus   │                         │   SyncState     │       │
//! │  │  ─────────────  │   ┌─────────────────┐   │  ─────────────  │       │
//! │  │  Stable  "ST"   │   │    LegType      │   │  Pending  (0)   │       │
//! │  │  Unstable "US"  │   │  ─────────────  │   │  Synced   (1)   │       │
//! │  └─────────────────┘   │  Inbound        │   │  (one-way)      │       │
//! │                        │  Outbound       │   └─────────────────┘       │
//! │                        └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! A transaction carries two identifiers:
//! - `id`: store-assigned row id, immutable, used for updates
//! - `document_number`: globally unique business number (`A-1001`), immutable

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Timestamp format used on the wire and inside JSON columns.
pub const WIRE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats a timestamp the way the remote authority expects it.
pub fn format_wire_datetime(dt: DateTime<Utc>) -> String {
    dt.format(WIRE_DATETIME_FORMAT).to_string()
}

// =============================================================================
// Scale Readings
// =============================================================================

/// Stability flag reported by the scale indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleStatus {
    /// The indicator reports a settled weight (`ST` prefix on the line).
    Stable,
    /// Anything else: the platform is still moving or the line is noise.
    Unstable,
}

impl ScaleStatus {
    /// Parses the status field of a raw serial line.
    pub fn from_flag(flag: &str) -> Self {
        if flag == "ST" {
            ScaleStatus::Stable
        } else {
            ScaleStatus::Unstable
        }
    }

    /// The two-letter wire representation.
    pub fn as_flag(&self) -> &'static str {
        match self {
            ScaleStatus::Stable => "ST",
            ScaleStatus::Unstable => "US",
        }
    }
}

/// A discrete weight reading.
///
/// Ephemeral: produced continuously by the stabilizer, snapshotted into the
/// state store and into a transaction leg at capture time, never persisted
/// on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightReading {
    pub status: ScaleStatus,
    /// Weight in kilograms, as parsed from the indicator.
    pub value: i64,
    pub observed_at: DateTime<Utc>,
}

// =============================================================================
// Weighing Legs
// =============================================================================

/// Direction of a weighing leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegType {
    /// Vehicle arrives loaded (`timbang-in`).
    #[serde(rename = "timbang-in")]
    Inbound,
    /// Vehicle leaves empty, or vice versa (`timbang-out`).
    #[serde(rename = "timbang-out")]
    Outbound,
}

impl LegType {
    /// Wire string stored in the ledger and sent to the remote authority.
    pub fn as_wire(&self) -> &'static str {
        match self {
            LegType::Inbound => "timbang-in",
            LegType::Outbound => "timbang-out",
        }
    }

    /// Parses the wire string. Empty means "leg not captured yet".
    pub fn from_wire(s: &str) -> Result<Option<Self>, CoreError> {
        match s {
            "" => Ok(None),
            "timbang-in" => Ok(Some(LegType::Inbound)),
            "timbang-out" => Ok(Some(LegType::Outbound)),
            other => Err(CoreError::InvalidLegType(other.to_string())),
        }
    }

    /// Human-readable description used in transaction log entries.
    pub fn describe(&self) -> &'static str {
        match self {
            LegType::Inbound => "carrying load",
            LegType::Outbound => "without load",
        }
    }
}

/// One weighing event within a transaction.
///
/// A transaction has exactly two leg slots. Leg 1 is captured at creation,
/// leg 2 at most once by a later update. An empty slot has no leg type and
/// a zero value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    pub value: i64,
    pub leg_type: Option<LegType>,
    pub captured_at: Option<DateTime<Utc>>,
}

impl Leg {
    /// An unpopulated leg slot.
    pub fn empty() -> Self {
        Leg {
            value: 0,
            leg_type: None,
            captured_at: None,
        }
    }

    /// A leg slot counts as populated once it has a type.
    pub fn is_populated(&self) -> bool {
        self.leg_type.is_some()
    }
}

// =============================================================================
// Sync Lifecycle
// =============================================================================

/// Transaction sync lifecycle. The transition is one-directional:
/// once Synced, a transaction never regresses to Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Pending,
    Synced,
}

impl SyncState {
    /// Integer column representation (0 = pending, 1 = synced).
    pub fn as_i64(&self) -> i64 {
        match self {
            SyncState::Pending => 0,
            SyncState::Synced => 1,
        }
    }

    pub fn from_i64(v: i64) -> Result<Self, CoreError> {
        match v {
            0 => Ok(SyncState::Pending),
            1 => Ok(SyncState::Synced),
            other => Err(CoreError::InvalidSyncState(other)),
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// One entry in a transaction's append-only log trail.
///
/// Newest entries are prepended: index 0 is always the latest event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub text: String,
    /// Wire-formatted timestamp (`YYYY-MM-DD HH:MM:SS`).
    pub timestamp: String,
}

impl LogEntry {
    pub fn new(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        LogEntry {
            text: text.into(),
            timestamp: format_wire_datetime(at),
        }
    }
}

/// A weighing transaction — the unit of business record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Store-assigned row id. Immutable once created.
    pub id: i64,
    /// Globally unique business number (`A-1001`). Immutable.
    pub document_number: String,
    pub vehicle_number: String,
    pub operator: String,
    pub customer: String,
    pub product: String,
    pub send_to: String,
    pub note: String,
    /// Incremented each time a receipt is produced. Never decremented.
    pub print_count: i64,
    pub leg1: Leg,
    pub leg2: Leg,
    /// Ordered free-form correction trail of related document numbers.
    pub correction_doc_numbers: Vec<String>,
    pub sync_state: SyncState,
    /// Wire-formatted timestamp set when the remote authority acknowledged.
    pub sync_datetime: Option<String>,
    pub created_by: String,
    /// Append-only log, newest first.
    pub logs: Vec<LogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// A transaction is complete when both legs are populated and the second
    /// leg carries a non-zero weight.
    ///
    /// Complete transactions are terminal for transaction entry: a vehicle
    /// lookup that intends to start a new leg-1 document treats them as
    /// "no open transaction". They remain eligible for sync and correction.
    pub fn is_complete(&self) -> bool {
        self.leg1.is_populated() && self.leg2.is_populated() && self.leg2.value != 0
    }
}

/// Fields supplied by the operator when creating a transaction (leg 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub vehicle_number: String,
    pub operator: String,
    pub customer: String,
    pub product: String,
    #[serde(default)]
    pub send_to: String,
    #[serde(default)]
    pub note: String,
    pub leg1_value: i64,
    pub leg1_type: Option<LegType>,
    /// Defaults to "now" when absent.
    #[serde(default)]
    pub leg1_captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub correction_doc_numbers: Vec<String>,
}

/// Fields supplied when closing a transaction (leg 2).
///
/// Only leg-2 fields, the note, and the correction trail are mutable; the
/// update also bumps the print counter by one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionUpdate {
    #[serde(default)]
    pub note: String,
    pub leg2_value: i64,
    pub leg2_type: Option<LegType>,
    /// Defaults to "now" when absent.
    #[serde(default)]
    pub leg2_captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub correction_doc_numbers: Vec<String>,
}

// =============================================================================
// Reference Data
// =============================================================================

/// The four reference-entity kinds mirrored from the remote authority.
///
/// Structurally identical lookup data: created or overwritten wholesale by
/// reference sync, never by local UI actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Customer,
    Product,
    Operator,
    /// Vehicle registration plates ("nopol" on the wire).
    Vehicle,
}

impl ReferenceKind {
    /// All kinds, in the order reference sync processes them.
    pub const ALL: [ReferenceKind; 4] = [
        ReferenceKind::Customer,
        ReferenceKind::Vehicle,
        ReferenceKind::Operator,
        ReferenceKind::Product,
    ];

    /// Collection path segment on the remote API.
    pub fn collection_segment(&self) -> &'static str {
        match self {
            ReferenceKind::Customer => "customers",
            ReferenceKind::Product => "products",
            ReferenceKind::Operator => "operators",
            ReferenceKind::Vehicle => "nopols",
        }
    }

    /// JSON field carrying the display name in remote payloads.
    pub fn display_field(&self) -> &'static str {
        match self {
            ReferenceKind::Customer => "customer",
            ReferenceKind::Product => "product",
            ReferenceKind::Operator => "operator",
            ReferenceKind::Vehicle => "nopol",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReferenceKind::Customer => "customer",
            ReferenceKind::Product => "product",
            ReferenceKind::Operator => "operator",
            ReferenceKind::Vehicle => "vehicle",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(value: i64, leg_type: Option<LegType>) -> Leg {
        Leg {
            value,
            leg_type,
            captured_at: None,
        }
    }

    fn transaction_with_legs(leg1: Leg, leg2: Leg) -> Transaction {
        Transaction {
            id: 1,
            document_number: "A-1001".to_string(),
            vehicle_number: "N 1234 AB".to_string(),
            operator: "OP".to_string(),
            customer: "CUST".to_string(),
            product: "COMPOST".to_string(),
            send_to: String::new(),
            note: String::new(),
            print_count: 0,
            leg1,
            leg2,
            correction_doc_numbers: vec![],
            sync_state: SyncState::Pending,
            sync_datetime: None,
            created_by: "tester".to_string(),
            logs: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn leg_type_wire_round_trip() {
        assert_eq!(LegType::from_wire("timbang-in").unwrap(), Some(LegType::Inbound));
        assert_eq!(LegType::from_wire("timbang-out").unwrap(), Some(LegType::Outbound));
        assert_eq!(LegType::from_wire("").unwrap(), None);
        assert!(LegType::from_wire("sideways").is_err());
    }

    #[test]
    fn transaction_completion_rule() {
        // Only leg 1 captured: still open.
        let open = transaction_with_legs(leg(12000, Some(LegType::Inbound)), Leg::empty());
        assert!(!open.is_complete());

        // Both legs with a non-zero leg-2 weight: complete.
        let done = transaction_with_legs(
            leg(12000, Some(LegType::Inbound)),
            leg(500, Some(LegType::Outbound)),
        );
        assert!(done.is_complete());

        // Leg 2 typed but zero weight: not complete.
        let zero = transaction_with_legs(
            leg(12000, Some(LegType::Inbound)),
            leg(0, Some(LegType::Outbound)),
        );
        assert!(!zero.is_complete());
    }

    #[test]
    fn sync_state_column_mapping() {
        assert_eq!(SyncState::Pending.as_i64(), 0);
        assert_eq!(SyncState::Synced.as_i64(), 1);
        assert_eq!(SyncState::from_i64(1).unwrap(), SyncState::Synced);
        assert!(SyncState::from_i64(7).is_err());
    }

    #[test]
    fn reference_kind_wire_names() {
        assert_eq!(ReferenceKind::Vehicle.collection_segment(), "nopols");
        assert_eq!(ReferenceKind::Vehicle.display_field(), "nopol");
        assert_eq!(ReferenceKind::Customer.collection_segment(), "customers");
    }
}
