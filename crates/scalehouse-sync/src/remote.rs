//! # Remote Authority API
//!
//! The wire contract with the remote authority, behind a trait so sync logic
//! can be driven by scripted doubles in tests.
//!
//! ## Endpoints
//! ```text
//! HEAD {base}/api/health                         liveness probe
//! GET  {base}/api/timbangan-kompos/{collection}  reference pull
//! POST {base}/timbangan-kompos/                  transaction push
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

use crate::error::{SyncError, SyncResult};
use scalehouse_core::{format_wire_datetime, LogEntry, ReferenceKind, Transaction};

/// Per-request timeout for every remote call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Wire Payloads
// =============================================================================

/// One reference record as pulled from the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteReference {
    pub remote_id: String,
    pub name: String,
    /// Registered empty weight; only sent for vehicles, zero otherwise.
    pub weight_hint: i64,
}

/// Transaction body pushed to the remote, in the authority's column naming.
///
/// The sync fields are set optimistically (already marked synced) before the
/// POST; the local row only transitions after the remote acknowledges.
#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub id: i64,
    pub document_number: String,
    pub vehicle_number: String,
    pub operator: String,
    pub customer: String,
    pub product: String,
    pub send_to: String,
    pub note: String,
    pub print_count: i64,
    pub scaling_1_value: i64,
    pub scaling_1_type: String,
    pub scaling_1_datetime: String,
    pub scaling_2_value: i64,
    pub scaling_2_type: String,
    pub scaling_2_datetime: String,
    pub correction_doc_number: Vec<String>,
    pub sync_status: i64,
    pub sync_datetime: String,
    pub revision_stat: bool,
    pub created_by: String,
    pub logs: Vec<LogEntry>,
    pub created_at: String,
    pub updated_at: String,
}

impl PushPayload {
    /// Builds the push body from a ledger row, stamping the optimistic sync
    /// fields with `sync_datetime`.
    pub fn from_transaction(tx: &Transaction, sync_datetime: &str) -> Self {
        PushPayload {
            id: tx.id,
            document_number: tx.document_number.clone(),
            vehicle_number: tx.vehicle_number.clone(),
            operator: tx.operator.clone(),
            customer: tx.customer.clone(),
            product: tx.product.clone(),
            send_to: tx.send_to.clone(),
            note: tx.note.clone(),
            print_count: tx.print_count,
            scaling_1_value: tx.leg1.value,
            scaling_1_type: tx.leg1.leg_type.map(|t| t.as_wire()).unwrap_or("").to_string(),
            scaling_1_datetime: tx.leg1.captured_at.map(format_wire_datetime).unwrap_or_default(),
            scaling_2_value: tx.leg2.value,
            scaling_2_type: tx.leg2.leg_type.map(|t| t.as_wire()).unwrap_or("").to_string(),
            scaling_2_datetime: tx.leg2.captured_at.map(format_wire_datetime).unwrap_or_default(),
            correction_doc_number: tx.correction_doc_numbers.clone(),
            sync_status: 1,
            sync_datetime: sync_datetime.to_string(),
            revision_stat: false,
            created_by: tx.created_by.clone(),
            logs: tx.logs.clone(),
            created_at: format_wire_datetime(tx.created_at),
            updated_at: format_wire_datetime(tx.updated_at),
        }
    }
}

/// Envelope wrapping a pushed transaction.
#[derive(Debug, Clone, Serialize)]
pub struct PushEnvelope {
    #[serde(rename = "isRevision")]
    pub is_revision: bool,
    #[serde(rename = "formData")]
    pub form_data: PushPayload,
}

// =============================================================================
// Remote API Trait
// =============================================================================

/// The remote authority, as sync logic sees it.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Lightweight liveness probe.
    async fn check_health(&self) -> SyncResult<()>;

    /// Pulls the full collection for a reference kind.
    async fn fetch_references(&self, kind: ReferenceKind) -> SyncResult<Vec<RemoteReference>>;

    /// Pushes one finished transaction.
    async fn push_transaction(&self, envelope: &PushEnvelope) -> SyncResult<()>;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// `RemoteApi` over HTTP with a fixed per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(HttpRemote {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn check_health(&self) -> SyncResult<()> {
        let url = format!("{}/api/health", self.base_url);
        let response = self.client.head(&url).send().await?;

        if !response.status().is_success() {
            return Err(SyncError::RemoteRejected {
                status: response.status().as_u16(),
                operation: "health".to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_references(&self, kind: ReferenceKind) -> SyncResult<Vec<RemoteReference>> {
        let url = format!(
            "{}/api/timbangan-kompos/{}",
            self.base_url,
            kind.collection_segment()
        );
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(SyncError::RemoteRejected {
                status: response.status().as_u16(),
                operation: format!("fetch {}", kind),
            });
        }

        let records: Vec<serde_json::Value> = response.json().await?;

        let mut references = Vec::with_capacity(records.len());
        for record in &records {
            match parse_reference(record, kind) {
                Some(reference) => references.push(reference),
                None => {
                    // One bad record must not poison the whole pull.
                    warn!(%kind, ?record, "Skipping malformed reference record");
                }
            }
        }
        Ok(references)
    }

    async fn push_transaction(&self, envelope: &PushEnvelope) -> SyncResult<()> {
        let url = format!("{}/timbangan-kompos/", self.base_url);
        let response = self.client.post(&url).json(envelope).send().await?;

        if !response.status().is_success() {
            return Err(SyncError::RemoteRejected {
                status: response.status().as_u16(),
                operation: format!("push {}", envelope.form_data.document_number),
            });
        }
        Ok(())
    }
}

fn parse_reference(record: &serde_json::Value, kind: ReferenceKind) -> Option<RemoteReference> {
    let remote_id = record.get("_id")?.as_str()?.to_string();
    let name = record.get(kind.display_field())?.as_str()?.to_string();
    let weight_hint = match kind {
        ReferenceKind::Vehicle => record.get("weight").and_then(|w| w.as_i64()).unwrap_or(0),
        _ => 0,
    };
    Some(RemoteReference {
        remote_id,
        name,
        weight_hint,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use scalehouse_core::{Leg, LegType, SyncState};

    fn sample_transaction() -> Transaction {
        Transaction {
            id: 7,
            document_number: "A-1004".to_string(),
            vehicle_number: "N 1234 AB".to_string(),
            operator: "BUDI".to_string(),
            customer: "PT AGRO".to_string(),
            product: "COMPOST".to_string(),
            send_to: "WAREHOUSE 2".to_string(),
            note: "".to_string(),
            print_count: 1,
            leg1: Leg {
                value: 12000,
                leg_type: Some(LegType::Inbound),
                captured_at: Some(Utc::now()),
            },
            leg2: Leg {
                value: 500,
                leg_type: Some(LegType::Outbound),
                captured_at: Some(Utc::now()),
            },
            correction_doc_numbers: vec!["A-1001".to_string()],
            sync_state: SyncState::Pending,
            sync_datetime: None,
            created_by: "station-1".to_string(),
            logs: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn payload_uses_authority_field_names() {
        let payload = PushPayload::from_transaction(&sample_transaction(), "2026-08-29 10:00:00");
        let envelope = PushEnvelope {
            is_revision: false,
            form_data: payload,
        };

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["isRevision"], false);

        let form = &json["formData"];
        assert_eq!(form["scaling_1_type"], "timbang-in");
        assert_eq!(form["scaling_2_value"], 500);
        assert_eq!(form["correction_doc_number"][0], "A-1001");
        // Optimistic sync fields are stamped before the remote confirms.
        assert_eq!(form["sync_status"], 1);
        assert_eq!(form["sync_datetime"], "2026-08-29 10:00:00");
        assert_eq!(form["revision_stat"], false);
    }

    #[test]
    fn reference_parsing_per_kind() {
        let vehicle = serde_json::json!({"_id": "v-1", "nopol": "N 1 A", "weight": 7500, "_v": 0});
        let parsed = parse_reference(&vehicle, ReferenceKind::Vehicle).unwrap();
        assert_eq!(parsed.name, "N 1 A");
        assert_eq!(parsed.weight_hint, 7500);

        let customer = serde_json::json!({"_id": "c-1", "customer": "PT AGRO"});
        let parsed = parse_reference(&customer, ReferenceKind::Customer).unwrap();
        assert_eq!(parsed.weight_hint, 0);

        // Wrong display field for the kind: skipped.
        assert!(parse_reference(&customer, ReferenceKind::Product).is_none());
    }
}
