//! # Transaction Repository
//!
//! Ledger operations for weighing transactions.
//!
//! ## Transaction Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Weighing Transaction Lifecycle                        │
//! │                                                                         │
//! │  1. CREATE (leg 1)                                                     │
//! │     └── create() → document number allocated (prefix A),               │
//! │         initial log entry, sync_status = Pending                       │
//! │                                                                         │
//! │  2. UPDATE (leg 2, at most once)                                       │
//! │     └── update() → leg-2 fields + note + corrections,                  │
//! │         log entry prepended, print counter bumped                      │
//! │                                                                         │
//! │  3. PUSH SYNC                                                          │
//! │     └── mark_synced() → sync_status = Synced (one-way)                 │
//! │                                                                         │
//! │  Rows are NEVER deleted; leaving the pending queue is a status         │
//! │  transition, not row removal.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Document Number Allocation
//! `create()` runs "SELECT MAX(sequence) + insert" inside one database
//! transaction while holding the shared write gate, so concurrent creators
//! can never read the same MAX and collide. The UNIQUE constraint on
//! `document_number` backstops the invariant.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{DbError, DbResult};
use scalehouse_core::{
    format_document_number, next_sequence, DocumentPrefix, Leg, LegType, LogEntry, SyncState,
    Transaction, TransactionDraft, TransactionUpdate, PUSH_BATCH_SIZE,
};

/// Columns selected for every transaction read, in `map_row` order.
const TRANSACTION_COLUMNS: &str = "\
    id, document_number, vehicle_number, operator, customer, product, \
    send_to, note, print_count, \
    leg1_value, leg1_type, leg1_captured_at, \
    leg2_value, leg2_type, leg2_captured_at, \
    correction_doc_numbers, sync_status, sync_datetime, \
    created_by, logs, created_at, updated_at";

/// Repository for weighing transaction operations.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
    create_gate: Arc<Mutex<()>>,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool, create_gate: Arc<Mutex<()>>) -> Self {
        TransactionRepository { pool, create_gate }
    }

    /// Creates a new transaction from a leg-1 draft.
    ///
    /// Allocates the next document number under the normal prefix, defaults
    /// the leg-1 capture time to now, writes the initial log entry, and
    /// marks the row Pending for sync.
    pub async fn create(&self, draft: &TransactionDraft, created_by: &str) -> DbResult<Transaction> {
        let now = Utc::now();
        let leg1_captured_at = draft.leg1_captured_at.unwrap_or(now);

        let log_text = match draft.leg1_type {
            Some(t) => format!("Document created with first weighing: {}", t.describe()),
            None => "Document created without a first weighing type".to_string(),
        };
        let logs = vec![LogEntry::new(log_text, now)];
        let logs_json = serde_json::to_string(&logs).map_err(|e| DbError::Internal(e.to_string()))?;
        let corrections_json = serde_json::to_string(&draft.correction_doc_numbers)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        // Serialize allocation + insert against all other creators.
        let _writer = self.create_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let document_number = allocate_document_number(&mut tx, DocumentPrefix::Normal).await?;

        debug!(
            document_number = %document_number,
            vehicle = %draft.vehicle_number,
            "Creating weighing transaction"
        );

        let leg1_type = draft.leg1_type.map(|t| t.as_wire()).unwrap_or("");
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (
                document_number, vehicle_number, operator, customer, product,
                send_to, note, print_count,
                leg1_value, leg1_type, leg1_captured_at,
                leg2_value, leg2_type, leg2_captured_at,
                correction_doc_numbers, sync_status, sync_datetime,
                created_by, logs, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, 0, '', NULL, ?, 0, NULL, ?, ?, ?, ?)
            "#,
        )
        .bind(&document_number)
        .bind(&draft.vehicle_number)
        .bind(&draft.operator)
        .bind(&draft.customer)
        .bind(&draft.product)
        .bind(draft.send_to.to_uppercase())
        .bind(draft.note.to_uppercase())
        .bind(draft.leg1_value)
        .bind(leg1_type)
        .bind(leg1_captured_at)
        .bind(&corrections_json)
        .bind(created_by)
        .bind(&logs_json)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        tx.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("transaction", id))
    }

    /// Applies a leg-2 update to an existing transaction.
    ///
    /// Only leg-2 fields, the note, the correction trail, and the print
    /// counter change; a log entry describing leg 2 is prepended. Fails with
    /// NotFound when the row does not exist.
    pub async fn update(&self, id: i64, update: &TransactionUpdate) -> DbResult<Transaction> {
        let now = Utc::now();

        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("transaction", id))?;

        let log_text = match update.leg2_type {
            Some(t) => format!("Document closed with second weighing: {}", t.describe()),
            None => "Document updated without a second weighing type".to_string(),
        };
        let mut logs = existing.logs.clone();
        logs.insert(0, LogEntry::new(log_text, now));
        let logs_json = serde_json::to_string(&logs).map_err(|e| DbError::Internal(e.to_string()))?;
        let corrections_json = serde_json::to_string(&update.correction_doc_numbers)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        let leg2_captured_at = update.leg2_captured_at.unwrap_or(now);
        let leg2_type = update.leg2_type.map(|t| t.as_wire()).unwrap_or("");

        debug!(id, document_number = %existing.document_number, "Updating weighing transaction");

        let result = sqlx::query(
            r#"
            UPDATE transactions SET
                note = ?,
                print_count = print_count + 1,
                leg2_value = ?,
                leg2_type = ?,
                leg2_captured_at = ?,
                correction_doc_numbers = ?,
                logs = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.note.to_uppercase())
        .bind(update.leg2_value)
        .bind(leg2_type)
        .bind(leg2_captured_at)
        .bind(&corrections_json)
        .bind(&logs_json)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("transaction", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("transaction", id))
    }

    /// Gets a transaction by row id.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE id = ?",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| map_row(&r)).transpose()
    }

    /// Returns the open transaction for a vehicle plate, if any.
    ///
    /// Looks up the most recent transaction for the plate. When that
    /// transaction is already complete (both legs populated, non-zero leg-2
    /// weight) this returns `None`: the caller must start a fresh document.
    /// This is a business rule, not absence of data — completed transactions
    /// stay in the ledger for sync and correction.
    pub async fn get_open_by_vehicle(&self, plate: &str) -> DbResult<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE vehicle_number = ? ORDER BY id DESC LIMIT 1",
            TRANSACTION_COLUMNS
        ))
        .bind(plate)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let transaction = map_row(&row)?;

        if transaction.is_complete() {
            return Ok(None);
        }
        Ok(Some(transaction))
    }

    /// Lists pending, leg-complete transactions in creation order.
    ///
    /// Partially-completed transactions are never pushed, so both legs must
    /// be populated with non-zero values before a row qualifies.
    pub async fn list_pending_sync(&self, limit: u32) -> DbResult<Vec<Transaction>> {
        let limit = limit.min(PUSH_BATCH_SIZE);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM transactions
            WHERE sync_status = 0
              AND leg1_value <> 0 AND LENGTH(leg1_type) > 0
              AND leg2_value <> 0 AND LENGTH(leg2_type) > 0
            ORDER BY created_at ASC, id ASC
            LIMIT ?
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row).collect()
    }

    /// Marks a transaction as acknowledged by the remote authority.
    ///
    /// One-directional: the row never returns to Pending.
    pub async fn mark_synced(&self, id: i64, sync_datetime: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE transactions SET sync_status = 1, sync_datetime = ?, updated_at = ? WHERE id = ?",
        )
        .bind(sync_datetime)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("transaction", id));
        }
        Ok(())
    }

    /// Bumps the print counter after a receipt is produced.
    pub async fn increment_print_count(&self, id: i64) -> DbResult<()> {
        let now = Utc::now();

        let result =
            sqlx::query("UPDATE transactions SET print_count = print_count + 1, updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("transaction", id));
        }
        Ok(())
    }
}

/// Allocates the next document number under `prefix` within the caller's
/// database transaction.
///
/// The sequence is the numeric MAX over the suffix, not a lexicographic
/// ordering — "A-999" must not shadow "A-1001".
async fn allocate_document_number(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    prefix: DocumentPrefix,
) -> DbResult<String> {
    let pattern = format!("{}-%", prefix.as_str());

    // substr() skips the "<prefix>-" lead-in (single-letter prefixes).
    let max_existing: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT MAX(CAST(SUBSTR(document_number, 3) AS INTEGER))
        FROM transactions
        WHERE document_number LIKE ?
        "#,
    )
    .bind(&pattern)
    .fetch_one(&mut **tx)
    .await?;

    Ok(format_document_number(prefix, next_sequence(max_existing)))
}

/// Maps a ledger row onto the domain transaction type.
fn map_row(row: &SqliteRow) -> DbResult<Transaction> {
    let leg1_type: String = row.try_get("leg1_type")?;
    let leg2_type: String = row.try_get("leg2_type")?;
    let sync_status: i64 = row.try_get("sync_status")?;
    let corrections: String = row.try_get("correction_doc_numbers")?;
    let logs: String = row.try_get("logs")?;

    Ok(Transaction {
        id: row.try_get("id")?,
        document_number: row.try_get("document_number")?,
        vehicle_number: row.try_get("vehicle_number")?,
        operator: row.try_get("operator")?,
        customer: row.try_get("customer")?,
        product: row.try_get("product")?,
        send_to: row.try_get("send_to")?,
        note: row.try_get("note")?,
        print_count: row.try_get("print_count")?,
        leg1: Leg {
            value: row.try_get("leg1_value")?,
            leg_type: LegType::from_wire(&leg1_type)?,
            captured_at: row.try_get::<Option<DateTime<Utc>>, _>("leg1_captured_at")?,
        },
        leg2: Leg {
            value: row.try_get("leg2_value")?,
            leg_type: LegType::from_wire(&leg2_type)?,
            captured_at: row.try_get::<Option<DateTime<Utc>>, _>("leg2_captured_at")?,
        },
        correction_doc_numbers: serde_json::from_str(&corrections)
            .map_err(|e| DbError::CorruptRow(e.to_string()))?,
        sync_state: SyncState::from_i64(sync_status)?,
        sync_datetime: row.try_get("sync_datetime")?,
        created_by: row.try_get("created_by")?,
        logs: serde_json::from_str(&logs).map_err(|e| DbError::CorruptRow(e.to_string()))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn draft(plate: &str) -> TransactionDraft {
        TransactionDraft {
            vehicle_number: plate.to_string(),
            operator: "BUDI".to_string(),
            customer: "PT AGRO".to_string(),
            product: "COMPOST".to_string(),
            send_to: "warehouse 2".to_string(),
            note: "first trip".to_string(),
            leg1_value: 12000,
            leg1_type: Some(LegType::Inbound),
            leg1_captured_at: None,
            correction_doc_numbers: vec![],
        }
    }

    fn closing_update() -> TransactionUpdate {
        TransactionUpdate {
            note: "done".to_string(),
            leg2_value: 500,
            leg2_type: Some(LegType::Outbound),
            leg2_captured_at: None,
            correction_doc_numbers: vec![],
        }
    }

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn create_assigns_document_number_and_pending_state() {
        let db = test_db().await;
        let repo = db.transactions();

        let created = repo.create(&draft("N 1234 AB"), "tester").await.unwrap();

        assert_eq!(created.document_number, "A-1001");
        assert_eq!(created.sync_state, SyncState::Pending);
        assert_eq!(created.send_to, "WAREHOUSE 2");
        assert_eq!(created.logs.len(), 1);
        assert!(created.leg1.captured_at.is_some());
        assert!(!created.leg2.is_populated());
        assert_eq!(created.leg2.value, 0);
    }

    #[tokio::test]
    async fn document_numbers_increase_within_prefix() {
        let db = test_db().await;
        let repo = db.transactions();

        let first = repo.create(&draft("N 1 A"), "tester").await.unwrap();
        let second = repo.create(&draft("N 2 B"), "tester").await.unwrap();

        assert_eq!(first.document_number, "A-1001");
        assert_eq!(second.document_number, "A-1002");
    }

    #[tokio::test]
    async fn concurrent_creation_never_collides() {
        // File-backed database so multiple pool connections actually share
        // state; in-memory pools are capped at one connection.
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("ledger.db")))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = db.transactions();
            handles.push(tokio::spawn(async move {
                repo.create(&draft(&format!("N {} X", i)), "tester")
                    .await
                    .unwrap()
                    .document_number
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }

        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 8, "duplicate document numbers issued");

        let expected: Vec<String> = (1001..=1008).map(|n| format!("A-{}", n)).collect();
        assert_eq!(numbers, expected);
    }

    #[tokio::test]
    async fn lookup_returns_open_transaction() {
        let db = test_db().await;
        let repo = db.transactions();

        repo.create(&draft("N 1234 AB"), "tester").await.unwrap();
        let found = repo.get_open_by_vehicle("N 1234 AB").await.unwrap().unwrap();

        assert_eq!(found.sync_state, SyncState::Pending);
        assert!(found.leg2.leg_type.is_none());
        assert_eq!(found.leg2.value, 0);
    }

    #[tokio::test]
    async fn lookup_hides_completed_transaction() {
        let db = test_db().await;
        let repo = db.transactions();

        let created = repo.create(&draft("N 1234 AB"), "tester").await.unwrap();
        repo.update(created.id, &closing_update()).await.unwrap();

        // Latest transaction for the plate is complete: leg1 inbound,
        // leg2 outbound with value 500. The plate has no open document.
        assert!(repo.get_open_by_vehicle("N 1234 AB").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_prepends_exactly_one_log_entry() {
        let db = test_db().await;
        let repo = db.transactions();

        let created = repo.create(&draft("N 1234 AB"), "tester").await.unwrap();
        let logs_before = created.logs.len();

        let updated = repo.update(created.id, &closing_update()).await.unwrap();

        assert_eq!(updated.logs.len(), logs_before + 1);
        assert!(updated.logs[0].text.contains("second weighing"));
        assert_eq!(updated.print_count, created.print_count + 1);
        assert_eq!(updated.leg2.value, 500);
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let db = test_db().await;
        let repo = db.transactions();

        let err = repo.update(999, &closing_update()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn pending_sync_excludes_incomplete_transactions() {
        let db = test_db().await;
        let repo = db.transactions();

        let open = repo.create(&draft("N 1 A"), "tester").await.unwrap();
        let closed = repo.create(&draft("N 2 B"), "tester").await.unwrap();
        repo.update(closed.id, &closing_update()).await.unwrap();

        let pending = repo.list_pending_sync(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, closed.id);
        assert_ne!(pending[0].id, open.id);
    }

    #[tokio::test]
    async fn mark_synced_removes_from_pending_queue() {
        let db = test_db().await;
        let repo = db.transactions();

        let created = repo.create(&draft("N 1 A"), "tester").await.unwrap();
        repo.update(created.id, &closing_update()).await.unwrap();
        repo.mark_synced(created.id, "2026-08-29 10:00:00").await.unwrap();

        assert!(repo.list_pending_sync(10).await.unwrap().is_empty());

        // The row itself is still there, just Synced.
        let row = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(row.sync_state, SyncState::Synced);
        assert_eq!(row.sync_datetime.as_deref(), Some("2026-08-29 10:00:00"));
    }
}
