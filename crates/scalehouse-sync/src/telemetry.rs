//! # MQTT Telemetry
//!
//! Broker session for the station: presence, live weight channel, and the
//! driver of the sync cadence.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Telemetry Task                                   │
//! │                                                                         │
//! │  connect (clean session, retained last-will {"status":false})           │
//! │       │                                                                 │
//! │   ConnAck ──▶ mqtt.connected = true                                     │
//! │       │       start heartbeat task (5s: presence + scale snapshot)      │
//! │       │       start sync task      (10s: orchestrator cycle)            │
//! │       │       (each only when not already running)                      │
//! │       │                                                                 │
//! │   disconnect / error ──▶ mqtt.connected = false                         │
//! │                          abort both tasks (idempotent)                  │
//! │                          event loop reconnects, back to ConnAck         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The retained last-will means consumers see `{"status":false}` the moment
//! the broker decides the station died, with no polling.

use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::orchestrator::SyncOrchestrator;
use crate::remote::RemoteApi;
use scalehouse_store::{IntervalConfig, MqttConfig, StateStoreHandle};

/// Station presence topic. Retained so late subscribers see current state.
pub const STATUS_TOPIC: &str = "timbangan-kompos/client-status";

/// Live weight channel.
pub const DATA_TOPIC: &str = "timbangan-kompos/data-timbang-mesin";

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Handle to the telemetry task.
pub struct TelemetryHandle {
    client: AsyncClient,
    task: JoinHandle<()>,
}

impl TelemetryHandle {
    /// Publishes the offline status and tears the session down.
    pub async fn shutdown(self) {
        let _ = self
            .client
            .publish(STATUS_TOPIC, QoS::AtLeastOnce, true, r#"{"status":false}"#)
            .await;
        let _ = self.client.disconnect().await;
        self.task.abort();
    }
}

/// The telemetry component.
pub struct Telemetry;

impl Telemetry {
    /// Connects to the broker and spawns the session task.
    pub fn spawn<R: RemoteApi + 'static>(
        config: MqttConfig,
        intervals: IntervalConfig,
        store: StateStoreHandle,
        orchestrator: Arc<SyncOrchestrator<R>>,
    ) -> TelemetryHandle {
        let (host, port) = config.host_and_port();
        info!(host = %host, port, client_id = %config.client_id, "Starting broker session");

        let mut options = MqttOptions::new(&config.client_id, host, port);
        options.set_keep_alive(Duration::from_secs(5));
        options.set_clean_session(true);
        options.set_last_will(LastWill::new(
            STATUS_TOPIC,
            r#"{"status":false}"#,
            QoS::AtLeastOnce,
            true,
        ));

        let (client, eventloop) = AsyncClient::new(options, EVENT_CHANNEL_CAPACITY);

        let task = tokio::spawn(run(
            client.clone(),
            eventloop,
            intervals,
            store,
            orchestrator,
        ));

        TelemetryHandle { client, task }
    }
}

async fn run<R: RemoteApi + 'static>(
    client: AsyncClient,
    mut eventloop: rumqttc::EventLoop,
    intervals: IntervalConfig,
    store: StateStoreHandle,
    orchestrator: Arc<SyncOrchestrator<R>>,
) {
    let mut heartbeat: Option<JoinHandle<()>> = None;
    let mut sync_loop: Option<JoinHandle<()>> = None;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Broker session established");
                let _ = store.update(|doc| doc.mqtt.connected = true).await;

                if heartbeat.is_none() {
                    heartbeat = Some(tokio::spawn(heartbeat_loop(
                        client.clone(),
                        store.clone(),
                        intervals.heartbeat_secs,
                    )));
                }
                if sync_loop.is_none() {
                    sync_loop = Some(tokio::spawn(sync_cadence(
                        orchestrator.clone(),
                        intervals.sync_secs,
                    )));
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("Broker disconnected");
                teardown(&store, &mut heartbeat, &mut sync_loop).await;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Broker session error");
                teardown(&store, &mut heartbeat, &mut sync_loop).await;
                // The event loop reconnects on the next poll; don't spin.
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Stops the periodic tasks and marks the channel down. Aborting an already
/// finished task is a no-op, so this is safe to call repeatedly.
async fn teardown(
    store: &StateStoreHandle,
    heartbeat: &mut Option<JoinHandle<()>>,
    sync_loop: &mut Option<JoinHandle<()>>,
) {
    let _ = store.update(|doc| doc.mqtt.connected = false).await;

    if let Some(task) = heartbeat.take() {
        task.abort();
    }
    if let Some(task) = sync_loop.take() {
        task.abort();
    }
}

/// Presence + live weight publisher.
async fn heartbeat_loop(client: AsyncClient, store: StateStoreHandle, period_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(period_secs));

    loop {
        ticker.tick().await;

        if let Err(e) = client
            .publish(STATUS_TOPIC, QoS::AtLeastOnce, true, r#"{"status":true}"#)
            .await
        {
            debug!(error = %e, "Heartbeat publish failed");
            continue;
        }

        if let Ok(doc) = store.read().await {
            let payload = serde_json::json!({
                "status": doc.scale.status,
                "value": doc.scale.value,
                "timestamp": doc.scale.timestamp,
            });
            let _ = client
                .publish(DATA_TOPIC, QoS::AtLeastOnce, false, payload.to_string())
                .await;
        }
    }
}

/// Fixed-cadence sync driver, alive only while the broker session is up.
async fn sync_cadence<R: RemoteApi>(orchestrator: Arc<SyncOrchestrator<R>>, period_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(period_secs));

    loop {
        ticker.tick().await;
        orchestrator.run_cycle().await;
    }
}
