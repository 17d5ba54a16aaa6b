//! # Reference Sync
//!
//! Pulls the remote authority's lookup collections into the local mirror.
//!
//! Pull direction only: local transactions never flow through here, and the
//! remote copy always wins (insert-or-overwrite by remote id). A failed pull
//! records failure status and leaves the existing mirror untouched, so the
//! operator keeps working from the last good copy.

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::remote::RemoteApi;
use scalehouse_core::ReferenceKind;
use scalehouse_db::Database;
use scalehouse_store::StateStoreHandle;

/// Syncs one reference kind: pull, upsert each record, record the outcome.
///
/// No-op while the remote is unreachable. The returned error is for the
/// caller's log line only; the per-kind status is already recorded.
pub async fn sync_kind<R: RemoteApi>(
    remote: &R,
    db: &Database,
    store: &StateStoreHandle,
    kind: ReferenceKind,
) -> SyncResult<()> {
    if !store.read().await?.server.reachable {
        return Ok(());
    }

    let result = pull_and_upsert(remote, db, kind).await;
    let succeeded = result.is_ok();

    let now = Utc::now();
    store
        .update(move |doc| doc.sync.for_kind(kind).record(succeeded, now))
        .await?;

    result
}

async fn pull_and_upsert<R: RemoteApi>(
    remote: &R,
    db: &Database,
    kind: ReferenceKind,
) -> SyncResult<()> {
    let records = remote.fetch_references(kind).await?;
    let repo = db.references();

    for record in &records {
        repo.upsert(kind, &record.remote_id, &record.name, record.weight_hint)
            .await?;
    }

    debug!(%kind, count = records.len(), "Reference mirror refreshed");
    Ok(())
}

/// Syncs all four reference kinds, one after another.
///
/// A failing kind never blocks the others.
pub async fn sync_all<R: RemoteApi>(remote: &R, db: &Database, store: &StateStoreHandle) {
    for kind in ReferenceKind::ALL {
        if let Err(e) = sync_kind(remote, db, store, kind).await {
            warn!(%kind, error = %e, "Reference sync failed");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{PushEnvelope, RemoteReference};
    use async_trait::async_trait;
    use scalehouse_db::DbConfig;
    use scalehouse_store::StateStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Double that serves fixed reference lists and counts calls.
    struct FixedRemote {
        references: Vec<RemoteReference>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteApi for FixedRemote {
        async fn check_health(&self) -> SyncResult<()> {
            Ok(())
        }

        async fn fetch_references(&self, _kind: ReferenceKind) -> SyncResult<Vec<RemoteReference>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.references.clone())
        }

        async fn push_transaction(&self, _envelope: &PushEnvelope) -> SyncResult<()> {
            Ok(())
        }
    }

    async fn setup() -> (Database, StateStoreHandle, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (store, _task) = StateStore::spawn(dir.path().join("state.json"));
        (db, store, dir)
    }

    #[tokio::test]
    async fn unreachable_server_is_a_no_op() {
        let (db, store, _dir) = setup().await;
        let remote = FixedRemote {
            references: vec![RemoteReference {
                remote_id: "c-1".to_string(),
                name: "PT AGRO".to_string(),
                weight_hint: 0,
            }],
            calls: AtomicUsize::new(0),
        };

        // server.reachable defaults to false.
        sync_kind(&remote, &db, &store, ReferenceKind::Customer)
            .await
            .unwrap();

        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
        assert!(db
            .references()
            .list_names(ReferenceKind::Customer)
            .await
            .unwrap()
            .is_empty());
        // No attempt recorded either.
        let doc = store.read().await.unwrap();
        assert!(doc.sync.customer.last_attempt_at.is_none());
    }

    #[tokio::test]
    async fn reachable_server_mirrors_and_records_success() {
        let (db, store, _dir) = setup().await;
        store
            .update(|doc| doc.server.reachable = true)
            .await
            .unwrap();

        let remote = FixedRemote {
            references: vec![
                RemoteReference {
                    remote_id: "c-1".to_string(),
                    name: "PT AGRO".to_string(),
                    weight_hint: 0,
                },
                RemoteReference {
                    remote_id: "c-2".to_string(),
                    name: "PT LESTARI".to_string(),
                    weight_hint: 0,
                },
            ],
            calls: AtomicUsize::new(0),
        };

        sync_kind(&remote, &db, &store, ReferenceKind::Customer)
            .await
            .unwrap();

        let names = db
            .references()
            .list_names(ReferenceKind::Customer)
            .await
            .unwrap();
        assert_eq!(names.len(), 2);

        let doc = store.read().await.unwrap();
        assert!(doc.sync.customer.succeeded);
        assert!(doc.sync.customer.last_attempt_at.is_some());
    }

    #[tokio::test]
    async fn failed_pull_keeps_the_old_mirror() {
        struct FailingRemote;

        #[async_trait]
        impl RemoteApi for FailingRemote {
            async fn check_health(&self) -> SyncResult<()> {
                Ok(())
            }
            async fn fetch_references(
                &self,
                kind: ReferenceKind,
            ) -> SyncResult<Vec<RemoteReference>> {
                Err(crate::error::SyncError::RemoteRejected {
                    status: 500,
                    operation: format!("fetch {}", kind),
                })
            }
            async fn push_transaction(&self, _envelope: &PushEnvelope) -> SyncResult<()> {
                Ok(())
            }
        }

        let (db, store, _dir) = setup().await;
        store
            .update(|doc| doc.server.reachable = true)
            .await
            .unwrap();
        db.references()
            .upsert(ReferenceKind::Customer, "c-1", "PT AGRO", 0)
            .await
            .unwrap();

        let result = sync_kind(&FailingRemote, &db, &store, ReferenceKind::Customer).await;
        assert!(result.is_err());

        // Existing mirror untouched, failure recorded.
        let names = db
            .references()
            .list_names(ReferenceKind::Customer)
            .await
            .unwrap();
        assert_eq!(names, vec!["PT AGRO".to_string()]);

        let doc = store.read().await.unwrap();
        assert!(!doc.sync.customer.succeeded);
        assert!(doc.sync.customer.last_attempt_at.is_some());
    }
}
