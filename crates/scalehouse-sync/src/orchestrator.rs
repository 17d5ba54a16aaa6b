//! # Sync Orchestrator
//!
//! One cycle of the offline-first sync dance, in fixed order:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          run_cycle()                                    │
//! │                                                                         │
//! │  1. health probe ───▶ server.reachable flag (fresh every cycle)        │
//! │  2. reference pull ──▶ customers, vehicles, operators, products        │
//! │  3. push sync ───────▶ ≤ 10 finished transactions, creation order      │
//! │                                                                         │
//! │  Every failure is folded into recorded status. A cycle never panics    │
//! │  and never surfaces an error to the operator.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{debug, warn};

use crate::push;
use crate::reference;
use crate::remote::RemoteApi;
use scalehouse_db::Database;
use scalehouse_store::StateStoreHandle;

/// Drives reference and push sync against one remote.
pub struct SyncOrchestrator<R: RemoteApi> {
    remote: R,
    db: Database,
    store: StateStoreHandle,
}

impl<R: RemoteApi> SyncOrchestrator<R> {
    pub fn new(remote: R, db: Database, store: StateStoreHandle) -> Self {
        SyncOrchestrator { remote, db, store }
    }

    /// Runs one full sync cycle.
    ///
    /// The health probe result gates everything downstream: an unreachable
    /// remote turns the rest of the cycle into a no-op until the next one.
    pub async fn run_cycle(&self) {
        let reachable = self.remote.check_health().await.is_ok();
        if let Err(e) = self
            .store
            .update(move |doc| doc.server.reachable = reachable)
            .await
        {
            warn!(error = %e, "Failed to record server reachability");
            return;
        }

        if !reachable {
            debug!("Remote unreachable, skipping sync cycle");
            return;
        }

        reference::sync_all(&self.remote, &self.db, &self.store).await;

        if let Err(e) = push::push_pending(&self.remote, &self.db, &self.store).await {
            warn!(error = %e, "Push sync failed");
        }
    }

    /// Shutdown hook: records everything as offline so a restarted agent
    /// starts from honest state.
    pub async fn stop_sync(&self) {
        let now = chrono::Utc::now();
        let _ = self
            .store
            .update(move |doc| {
                doc.server.reachable = false;
                doc.sync.data.record(false, now);
                doc.sync.customer.record(false, now);
                doc.sync.product.record(false, now);
                doc.sync.operator.record(false, now);
                doc.sync.vehicle.record(false, now);
            })
            .await;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SyncError, SyncResult};
    use crate::remote::{PushEnvelope, RemoteReference};
    use async_trait::async_trait;
    use scalehouse_core::ReferenceKind;
    use scalehouse_db::DbConfig;
    use scalehouse_store::StateStore;

    struct HealthyRemote;

    #[async_trait]
    impl RemoteApi for HealthyRemote {
        async fn check_health(&self) -> SyncResult<()> {
            Ok(())
        }
        async fn fetch_references(&self, kind: ReferenceKind) -> SyncResult<Vec<RemoteReference>> {
            Ok(vec![RemoteReference {
                remote_id: format!("{}-1", kind),
                name: format!("{} one", kind).to_uppercase(),
                weight_hint: 0,
            }])
        }
        async fn push_transaction(&self, _envelope: &PushEnvelope) -> SyncResult<()> {
            Ok(())
        }
    }

    struct DeadRemote;

    #[async_trait]
    impl RemoteApi for DeadRemote {
        async fn check_health(&self) -> SyncResult<()> {
            Err(SyncError::RemoteRejected {
                status: 503,
                operation: "health".to_string(),
            })
        }
        async fn fetch_references(&self, _kind: ReferenceKind) -> SyncResult<Vec<RemoteReference>> {
            panic!("fetch must not run while unreachable");
        }
        async fn push_transaction(&self, _envelope: &PushEnvelope) -> SyncResult<()> {
            panic!("push must not run while unreachable");
        }
    }

    #[tokio::test]
    async fn healthy_cycle_marks_reachable_and_mirrors_references() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (store, _task) = StateStore::spawn(dir.path().join("state.json"));

        let orchestrator = SyncOrchestrator::new(HealthyRemote, db.clone(), store.clone());
        orchestrator.run_cycle().await;

        let doc = store.read().await.unwrap();
        assert!(doc.server.reachable);
        assert!(doc.sync.customer.succeeded);

        for kind in ReferenceKind::ALL {
            assert_eq!(db.references().list_names(kind).await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn failed_probe_skips_everything_downstream() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (store, _task) = StateStore::spawn(dir.path().join("state.json"));

        // Pretend a previous cycle saw the server up.
        store
            .update(|doc| doc.server.reachable = true)
            .await
            .unwrap();

        let orchestrator = SyncOrchestrator::new(DeadRemote, db, store.clone());
        // DeadRemote panics if anything past the probe runs.
        orchestrator.run_cycle().await;

        assert!(!store.read().await.unwrap().server.reachable);
    }

    #[tokio::test]
    async fn stop_sync_records_offline_state() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (store, _task) = StateStore::spawn(dir.path().join("state.json"));

        let orchestrator = SyncOrchestrator::new(HealthyRemote, db, store.clone());
        orchestrator.run_cycle().await;
        orchestrator.stop_sync().await;

        let doc = store.read().await.unwrap();
        assert!(!doc.server.reachable);
        assert!(!doc.sync.customer.succeeded);
        assert!(!doc.sync.data.succeeded);
    }
}
