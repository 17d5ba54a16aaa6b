//! # Agent Configuration
//!
//! JSON configuration file for the agent: serial port parameters, broker and
//! remote authority endpoints, stabilizer toggle, and cadence intervals.
//!
//! The file self-initializes with documented defaults on first start, so a
//! technician can edit a real file instead of guessing key names.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};

/// Serial port parameters for the scale indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub path: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    /// `"none"`, `"odd"`, or `"even"`.
    pub parity: String,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            path: "COM3".to_string(),
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: 1,
            parity: "none".to_string(),
        }
    }
}

/// MQTT broker session parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// `mqtt://host:port` or plain `host:port`.
    pub url: String,
    pub client_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        MqttConfig {
            url: "mqtt://localhost:1883".to_string(),
            client_id: "timbangan-client-001".to_string(),
        }
    }
}

impl MqttConfig {
    /// Splits the url into (host, port) for the broker client.
    pub fn host_and_port(&self) -> (String, u16) {
        let trimmed = self
            .url
            .strip_prefix("mqtt://")
            .or_else(|| self.url.strip_prefix("tcp://"))
            .unwrap_or(&self.url);

        match trimmed.rsplit_once(':') {
            Some((host, port)) => (
                host.to_string(),
                port.parse().unwrap_or(1883),
            ),
            None => (trimmed.to_string(), 1883),
        }
    }
}

/// Remote authority endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            url: "http://localhost:3000".to_string(),
        }
    }
}

/// Stabilizer behavior toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerSettings {
    /// Swallow a stable emission equal to the previous one.
    pub suppress_repeat_emission: bool,
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        StabilizerSettings {
            suppress_repeat_emission: true,
        }
    }
}

/// Fixed cadences, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    /// Client-status heartbeat over the broker.
    pub heartbeat_secs: u64,
    /// Sync orchestrator cycle.
    pub sync_secs: u64,
    /// Serial reconnect backoff.
    pub serial_retry_secs: u64,
    /// Operator session auto-relock.
    pub relock_secs: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        IntervalConfig {
            heartbeat_secs: 5,
            sync_secs: 10,
            serial_retry_secs: 5,
            relock_secs: 180,
        }
    }
}

/// Complete agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub serial: SerialConfig,
    pub mqtt: MqttConfig,
    pub server: ServerConfig,
    pub stabilizer: StabilizerSettings,
    pub intervals: IntervalConfig,
}

impl AgentConfig {
    /// Loads the configuration file, writing defaults when it is missing.
    ///
    /// A present-but-malformed file is an error: silently replacing an edited
    /// config would discard a technician's changes.
    pub fn load_or_init(path: &Path) -> StoreResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let config = serde_json::from_str(&contents).map_err(|e| StoreError::Malformed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
                info!(path = %path.display(), "Loaded agent configuration");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "No configuration file, writing defaults");
                let config = AgentConfig::default();
                config.save(path)?;
                Ok(config)
            }
            Err(e) => Err(StoreError::io(path.display().to_string(), e)),
        }
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| StoreError::Malformed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| StoreError::io(path.display().to_string(), e))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_initializes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = AgentConfig::load_or_init(&path).unwrap();
        assert_eq!(config, AgentConfig::default());
        assert!(path.exists());

        // Second load reads the file it just wrote.
        let again = AgentConfig::load_or_init(&path).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"serial": {"path": "/dev/ttyUSB0"}}"#).unwrap();

        let config = AgentConfig::load_or_init(&path).unwrap();
        assert_eq!(config.serial.path, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.intervals.relock_secs, 180);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json at all").unwrap();

        assert!(matches!(
            AgentConfig::load_or_init(&path),
            Err(StoreError::Malformed { .. })
        ));
    }

    #[test]
    fn mqtt_url_parsing() {
        let mqtt = MqttConfig {
            url: "mqtt://broker.local:8883".to_string(),
            client_id: "c".to_string(),
        };
        assert_eq!(mqtt.host_and_port(), ("broker.local".to_string(), 8883));

        let bare = MqttConfig {
            url: "broker.local".to_string(),
            client_id: "c".to_string(),
        };
        assert_eq!(bare.host_and_port(), ("broker.local".to_string(), 1883));
    }
}
