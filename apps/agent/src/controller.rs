//! # Controller
//!
//! The request/response boundary of the agent: everything an attached
//! operator UI can ask for goes through here.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Controller                                    │
//! │                                                                         │
//! │  list_reference(kind)          selection lists for the entry form       │
//! │  lookup_by_vehicle(plate)      open transaction or None (start fresh)   │
//! │  validate_credentials(u, p)    unlock + armed 3-minute relock timer     │
//! │  lock_form()                   explicit relock                          │
//! │  current_reading()             instantaneous scale value (no gate)      │
//! │  create_transaction(draft)     leg 1 → new document                     │
//! │  update_transaction(id, upd)   leg 2 → totals for the receipt           │
//! │  record_print(id)              print counter bump                       │
//! │  connectivity_status()         connection flags snapshot                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation failures come back as the full message list; the business
//! rule "no open transaction for this plate" is `None`, never an error.

use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{AgentError, AgentResult};
use crate::events::{AgentEvent, ConnectivityStatus};
use scalehouse_core::{
    compute_totals, validation, ReferenceKind, Transaction, TransactionDraft, TransactionUpdate,
    WeightReading, WeightTotals,
};
use scalehouse_db::{CredentialCheck, Database};
use scalehouse_serial::ScaleReaderHandle;
use scalehouse_store::{AgentConfig, StateStoreHandle};

/// Outcome of an unlock attempt, shaped for direct display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockOutcome {
    pub unlocked: bool,
    pub message: String,
}

/// The operator-facing control plane.
pub struct Controller {
    db: Database,
    store: StateStoreHandle,
    reader: ScaleReaderHandle,
    events: broadcast::Sender<AgentEvent>,
    relock_after: Duration,
    station: String,
    mqtt_url: String,
    serial_path: String,

    /// Armed relock timer. At most one pending: a new unlock or an explicit
    /// lock cancels the previous one.
    relock_timer: Mutex<Option<JoinHandle<()>>>,
}

impl Controller {
    pub fn new(
        db: Database,
        store: StateStoreHandle,
        reader: ScaleReaderHandle,
        events: broadcast::Sender<AgentEvent>,
        config: &AgentConfig,
        station: impl Into<String>,
    ) -> Self {
        Controller {
            db,
            store,
            reader,
            events,
            relock_after: Duration::from_secs(config.intervals.relock_secs),
            station: station.into(),
            mqtt_url: config.mqtt.url.clone(),
            serial_path: config.serial.path.clone(),
            relock_timer: Mutex::new(None),
        }
    }

    // =========================================================================
    // Reference data
    // =========================================================================

    /// Names for one selection list, alphabetical.
    pub async fn list_reference(&self, kind: ReferenceKind) -> AgentResult<Vec<String>> {
        Ok(self.db.references().list_names(kind).await?)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// The open transaction for a plate, or `None` when the latest one is
    /// complete and a fresh document should be started.
    pub async fn lookup_by_vehicle(&self, plate: &str) -> AgentResult<Option<Transaction>> {
        Ok(self.db.transactions().get_open_by_vehicle(plate).await?)
    }

    /// Creates a leg-1 transaction after validating the draft.
    pub async fn create_transaction(&self, draft: &TransactionDraft) -> AgentResult<Transaction> {
        validation::validate_draft(draft).map_err(AgentError::Validation)?;

        let transaction = self.db.transactions().create(draft, &self.station).await?;
        info!(
            document_number = %transaction.document_number,
            vehicle = %transaction.vehicle_number,
            "Transaction created"
        );
        Ok(transaction)
    }

    /// Closes a transaction with its leg-2 update and returns the updated
    /// row together with receipt totals.
    pub async fn update_transaction(
        &self,
        id: i64,
        update: &TransactionUpdate,
    ) -> AgentResult<(Transaction, WeightTotals)> {
        validation::validate_update(update).map_err(AgentError::Validation)?;

        let transaction = self.db.transactions().update(id, update).await?;
        let totals = compute_totals(&[&transaction.leg1, &transaction.leg2]);
        info!(
            document_number = %transaction.document_number,
            net = totals.net,
            "Transaction closed"
        );
        Ok((transaction, totals))
    }

    /// Records that a receipt was printed for the transaction.
    pub async fn record_print(&self, id: i64) -> AgentResult<()> {
        Ok(self.db.transactions().increment_print_count(id).await?)
    }

    // =========================================================================
    // Scale
    // =========================================================================

    /// Instantaneous reading, bypassing the stability gate. Display only —
    /// captures should come from stable readings.
    pub fn current_reading(&self) -> WeightReading {
        self.reader.current_reading()
    }

    // =========================================================================
    // Session lock
    // =========================================================================

    /// Checks credentials; success unlocks the form and arms the relock
    /// timer. The two failure modes get distinct messages.
    pub async fn validate_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> AgentResult<UnlockOutcome> {
        validation::validate_credentials(username, password).map_err(AgentError::Validation)?;

        let outcome = match self.db.auth().validate(username, password).await? {
            CredentialCheck::Valid => {
                self.unlock().await?;
                UnlockOutcome {
                    unlocked: true,
                    message: "access granted".to_string(),
                }
            }
            CredentialCheck::UnknownUser => UnlockOutcome {
                unlocked: false,
                message: "username not registered".to_string(),
            },
            CredentialCheck::WrongPassword => UnlockOutcome {
                unlocked: false,
                message: "wrong password".to_string(),
            },
        };

        if !outcome.unlocked {
            warn!(username, "Unlock attempt rejected");
        }
        Ok(outcome)
    }

    /// Locks the form immediately and disarms any pending relock timer.
    pub async fn lock_form(&self) -> AgentResult<()> {
        if let Some(timer) = self.relock_timer.lock().await.take() {
            timer.abort();
        }
        self.store.update(|doc| doc.form_locked = true).await?;
        let _ = self.events.send(AgentEvent::FormLocked);
        Ok(())
    }

    async fn unlock(&self) -> AgentResult<()> {
        self.store.update(|doc| doc.form_locked = false).await?;
        let _ = self.events.send(AgentEvent::FormUnlocked);
        info!(relock_secs = self.relock_after.as_secs(), "Form unlocked");

        let mut timer = self.relock_timer.lock().await;
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let store = self.store.clone();
        let events = self.events.clone();
        let relock_after = self.relock_after;
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(relock_after).await;
            info!("Relock timeout elapsed, locking form");
            let _ = store.update(|doc| doc.form_locked = true).await;
            let _ = events.send(AgentEvent::FormLocked);
        }));

        Ok(())
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Connection flags snapshot for on-demand display.
    pub async fn connectivity_status(&self) -> AgentResult<ConnectivityStatus> {
        let doc = self.store.read().await?;
        Ok(ConnectivityStatus {
            mqtt_connected: doc.mqtt.connected,
            mqtt_url: self.mqtt_url.clone(),
            serial_connected: doc.serial.connected,
            serial_path: self.serial_path.clone(),
            server_reachable: doc.server.reachable,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
