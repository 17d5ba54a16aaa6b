//! # Agent Events
//!
//! Push notifications toward whatever front end is attached: a periodic
//! clock tick, connectivity status, live stable readings, and lock-state
//! changes. Everything flows through one broadcast channel; subscribers
//! that fall behind lag, they never block the agent.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use scalehouse_core::{format_wire_datetime, WeightReading};
use scalehouse_serial::ScaleReaderHandle;
use scalehouse_store::{AgentConfig, StateStoreHandle};

/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Clock tick cadence.
const CLOCK_TICK: Duration = Duration::from_secs(1);

/// Connectivity status cadence.
const STATUS_TICK: Duration = Duration::from_secs(2);

/// Connectivity snapshot pushed on a fixed cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityStatus {
    pub mqtt_connected: bool,
    pub mqtt_url: String,
    pub serial_connected: bool,
    pub serial_path: String,
    pub server_reachable: bool,
}

/// One push notification.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Wall-clock tick, wire-formatted (1 s cadence).
    ClockTick { datetime: String },
    /// Connectivity snapshot (2 s cadence).
    Connectivity(ConnectivityStatus),
    /// A trusted stable reading from the scale.
    StableReading(WeightReading),
    /// The operator form locked (startup, timeout, or explicit).
    FormLocked,
    /// The operator form unlocked after a successful credential check.
    FormUnlocked,
}

/// Creates the event channel.
pub fn channel() -> broadcast::Sender<AgentEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

/// Spawns the periodic notifier tasks and the stable-reading forwarder.
pub fn spawn_notifiers(
    events: broadcast::Sender<AgentEvent>,
    store: StateStoreHandle,
    reader: &ScaleReaderHandle,
    config: &AgentConfig,
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();

    // 1s wall clock.
    let clock_events = events.clone();
    tasks.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLOCK_TICK);
        loop {
            ticker.tick().await;
            let _ = clock_events.send(AgentEvent::ClockTick {
                datetime: format_wire_datetime(chrono::Utc::now()),
            });
        }
    }));

    // 2s connectivity snapshot.
    let status_events = events.clone();
    let mqtt_url = config.mqtt.url.clone();
    let serial_path = config.serial.path.clone();
    tasks.push(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATUS_TICK);
        loop {
            ticker.tick().await;
            let Ok(doc) = store.read().await else {
                debug!("State store gone, stopping connectivity notifier");
                break;
            };
            let _ = status_events.send(AgentEvent::Connectivity(ConnectivityStatus {
                mqtt_connected: doc.mqtt.connected,
                mqtt_url: mqtt_url.clone(),
                serial_connected: doc.serial.connected,
                serial_path: serial_path.clone(),
                server_reachable: doc.server.reachable,
            }));
        }
    }));

    // Forward stable readings as they happen.
    let mut readings = reader.subscribe();
    tasks.push(tokio::spawn(async move {
        loop {
            match readings.recv().await {
                Ok(reading) => {
                    let _ = events.send(AgentEvent::StableReading(reading));
                }
                // Missed readings are stale anyway; keep forwarding.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }));

    tasks
}
