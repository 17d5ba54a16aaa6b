//! # Push Sync
//!
//! Drains the pending queue of finished transactions to the remote authority.
//!
//! ## Ordering Contract
//! ```text
//! pending (creation order): [tx1] [tx2] [tx3] ... (at most 10 per cycle)
//!
//! POST tx1  ✓  → mark Synced locally, continue
//! POST tx2  ✗  → record failure, STOP — tx2 and tx3 stay Pending
//! (next cycle re-scans the queue from the start)
//! ```
//!
//! Stopping at the first failure keeps arrival order on the remote intact
//! and avoids hammering a struggling server with the rest of the batch.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::remote::{PushEnvelope, PushPayload, RemoteApi};
use scalehouse_core::{format_wire_datetime, PUSH_BATCH_SIZE};
use scalehouse_db::Database;
use scalehouse_store::StateStoreHandle;

/// Pushes up to one batch of pending transactions.
///
/// No-op while the remote is unreachable. Returns the number of transactions
/// confirmed this cycle.
pub async fn push_pending<R: RemoteApi>(
    remote: &R,
    db: &Database,
    store: &StateStoreHandle,
) -> SyncResult<usize> {
    if !store.read().await?.server.reachable {
        return Ok(0);
    }

    let repo = db.transactions();
    let batch = repo.list_pending_sync(PUSH_BATCH_SIZE).await?;
    if batch.is_empty() {
        return Ok(0);
    }

    debug!(count = batch.len(), "Pushing pending transactions");

    let mut confirmed = 0;
    for transaction in &batch {
        let now = Utc::now();
        let sync_datetime = format_wire_datetime(now);
        let envelope = PushEnvelope {
            is_revision: false,
            form_data: PushPayload::from_transaction(transaction, &sync_datetime),
        };

        match remote.push_transaction(&envelope).await {
            Ok(()) => {
                // Only now does the local row leave the pending queue.
                repo.mark_synced(transaction.id, &sync_datetime).await?;
                store
                    .update(move |doc| doc.sync.data.record(true, now))
                    .await?;
                confirmed += 1;
            }
            Err(e) => {
                warn!(
                    document_number = %transaction.document_number,
                    error = %e,
                    "Push rejected, stopping batch"
                );
                store
                    .update(move |doc| doc.sync.data.record(false, now))
                    .await?;
                break;
            }
        }
    }

    if confirmed > 0 {
        info!(confirmed, "Transactions acknowledged by remote");
    }
    Ok(confirmed)
}

// =============================================================================
// Tests
// =============================================================================
