//! # scalehouse-store
//!
//! File-backed configuration and runtime state for the weighbridge agent.
//!
//! Two documents live here:
//! - `AgentConfig` — technician-edited settings, read at startup.
//! - `StateDoc` — runtime observability state (connection flags, latest scale
//!   snapshot, per-activity sync status), owned by a single-writer actor so
//!   concurrent status reports never clobber each other.

pub mod config;
pub mod error;
pub mod state;

pub use config::{
    AgentConfig, IntervalConfig, MqttConfig, SerialConfig, ServerConfig, StabilizerSettings,
};
pub use error::{StoreError, StoreResult};
pub use state::{
    ChannelState, ScaleSnapshot, ServerState, StateDoc, StateStore, StateStoreHandle, SyncActivity,
    SyncStatus,
};
