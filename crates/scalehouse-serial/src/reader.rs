//! # Scale Reader
//!
//! Owns the serial port: opens it, reads lines, feeds the stabilizer, and
//! reconnects forever.
//!
//! ## Acquisition Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Scale Reader Task                                │
//! │                                                                         │
//! │   ┌─────────┐  ok   ┌──────────────────────────────────────────────┐   │
//! │   │  open   │──────▶│  read lines                                  │   │
//! │   │  port   │       │   line ──▶ raw watch ──▶ pull accessor       │   │
//! │   └─────────┘       │   line ──▶ stabilizer ──▶ stable reading     │   │
//! │        ▲            │                │                             │   │
//! │        │ 5s backoff │                ├──▶ state store snapshot     │   │
//! │        │            │                └──▶ broadcast to telemetry   │   │
//! │        │   error/EOF└──────────────────────────────────────────────┘   │
//! │        └──────────────────────┘                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One task, one backoff timer: there is never more than one pending
//! reconnect, and a successful open supersedes any waiting.

use chrono::Utc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};
use tracing::{debug, info, warn};

use crate::error::{SerialError, SerialResult};
use scalehouse_core::{parse_line, ScaleStatus, Stabilizer, StabilizerConfig, WeightReading};
use scalehouse_store::{ScaleSnapshot, SerialConfig, StateStoreHandle};

/// Capacity of the stable-reading broadcast channel. Slow subscribers lag
/// rather than block acquisition.
const READINGS_CHANNEL_CAPACITY: usize = 32;

/// Handle to the scale reader task.
pub struct ScaleReaderHandle {
    raw_line: watch::Receiver<String>,
    readings_tx: broadcast::Sender<WeightReading>,
    task: JoinHandle<()>,
}

impl ScaleReaderHandle {
    /// Subscribes to trusted stable readings.
    pub fn subscribe(&self) -> broadcast::Receiver<WeightReading> {
        self.readings_tx.subscribe()
    }

    /// Best-effort instantaneous reading from the latest raw line.
    ///
    /// Bypasses the stability gate: useful for live display, never for
    /// capture. Unstable zero when nothing has been received yet.
    pub fn current_reading(&self) -> WeightReading {
        let line = self.raw_line.borrow().clone();
        match parse_line(&line) {
            Some((status, value)) => WeightReading {
                status,
                value,
                observed_at: Utc::now(),
            },
            None => WeightReading {
                status: ScaleStatus::Unstable,
                value: 0,
                observed_at: Utc::now(),
            },
        }
    }

    /// Stops the acquisition task.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// The scale reader component.
pub struct ScaleReader;

impl ScaleReader {
    /// Spawns the acquisition task.
    ///
    /// Fails only on unusable configuration; port-open failures are handled
    /// by the reconnect loop.
    pub fn spawn(
        config: SerialConfig,
        stabilizer_config: StabilizerConfig,
        retry_interval: Duration,
        store: StateStoreHandle,
    ) -> SerialResult<ScaleReaderHandle> {
        // Validate parity up front so a typo fails at startup, not in the loop.
        parse_parity(&config.parity)?;

        let (raw_tx, raw_rx) = watch::channel(String::new());
        let (readings_tx, _) = broadcast::channel(READINGS_CHANNEL_CAPACITY);

        let task = tokio::spawn(run(
            config,
            stabilizer_config,
            retry_interval,
            store,
            raw_tx,
            readings_tx.clone(),
        ));

        Ok(ScaleReaderHandle {
            raw_line: raw_rx,
            readings_tx,
            task,
        })
    }
}

async fn run(
    config: SerialConfig,
    stabilizer_config: StabilizerConfig,
    retry_interval: Duration,
    store: StateStoreHandle,
    raw_tx: watch::Sender<String>,
    readings_tx: broadcast::Sender<WeightReading>,
) {
    let mut stabilizer = Stabilizer::new(stabilizer_config);

    loop {
        let port = open_port(&config);

        let stream = match port {
            Ok(stream) => stream,
            Err(e) => {
                warn!(path = %config.path, error = %e, "Failed to open scale port, retrying");
                mark_connected(&store, false).await;
                tokio::time::sleep(retry_interval).await;
                continue;
            }
        };

        info!(path = %config.path, baud = config.baud_rate, "Scale port open");
        let _ = raw_tx.send(String::new());
        mark_connected(&store, true).await;

        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let _ = raw_tx.send(line.clone());

                    if let Some(reading) = stabilizer.feed(&line, Utc::now()) {
                        debug!(value = reading.value, "Stable weight reading");
                        let snapshot = ScaleSnapshot::from_reading(&reading);
                        let _ = store.update(move |doc| doc.scale = snapshot).await;
                        let _ = readings_tx.send(reading);
                    }
                }
                Ok(None) => {
                    warn!(path = %config.path, "Scale stream ended");
                    break;
                }
                Err(e) => {
                    warn!(path = %config.path, error = %e, "Scale read failed");
                    break;
                }
            }
        }

        mark_connected(&store, false).await;
        tokio::time::sleep(retry_interval).await;
    }
}

fn open_port(config: &SerialConfig) -> tokio_serial::Result<tokio_serial::SerialStream> {
    let parity = parse_parity(&config.parity).unwrap_or(Parity::None);

    tokio_serial::new(&config.path, config.baud_rate)
        .data_bits(match config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        })
        .stop_bits(match config.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        })
        .parity(parity)
        .open_native_async()
}

fn parse_parity(name: &str) -> SerialResult<Parity> {
    match name {
        "none" => Ok(Parity::None),
        "odd" => Ok(Parity::Odd),
        "even" => Ok(Parity::Even),
        other => Err(SerialError::InvalidParity(other.to_string())),
    }
}

async fn mark_connected(store: &StateStoreHandle, connected: bool) {
    let _ = store
        .update(move |doc| doc.serial.connected = connected)
        .await;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use scalehouse_store::StateStore;

    #[test]
    fn parity_names() {
        assert_eq!(parse_parity("none").unwrap(), Parity::None);
        assert_eq!(parse_parity("odd").unwrap(), Parity::Odd);
        assert_eq!(parse_parity("even").unwrap(), Parity::Even);
        assert!(parse_parity("mark").is_err());
    }

    #[tokio::test]
    async fn spawn_rejects_bad_parity() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _task) = StateStore::spawn(dir.path().join("state.json"));

        let config = SerialConfig {
            parity: "mark".to_string(),
            ..SerialConfig::default()
        };
        let result = ScaleReader::spawn(
            config,
            StabilizerConfig::default(),
            Duration::from_secs(5),
            store,
        );
        assert!(matches!(result, Err(SerialError::InvalidParity(_))));
    }

    #[tokio::test]
    async fn missing_port_marks_disconnected_and_keeps_retrying() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _task) = StateStore::spawn(dir.path().join("state.json"));

        let config = SerialConfig {
            path: "/dev/definitely-not-a-scale".to_string(),
            ..SerialConfig::default()
        };
        let reader = ScaleReader::spawn(
            config,
            StabilizerConfig::default(),
            Duration::from_millis(10),
            store.clone(),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!store.read().await.unwrap().serial.connected);

        // Nothing buffered yet: pull accessor falls back to unstable zero.
        let reading = reader.current_reading();
        assert_eq!(reading.status, ScaleStatus::Unstable);
        assert_eq!(reading.value, 0);

        reader.shutdown();
    }
}
