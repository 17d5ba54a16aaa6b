//! # scalehouse-sync
//!
//! Everything that leaves the station: reference pulls and transaction
//! pushes over HTTP, and telemetry over MQTT.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          scalehouse-sync                                │
//! │                                                                         │
//! │  ┌────────────┐   drives   ┌──────────────────┐   uses   ┌───────────┐ │
//! │  │ Telemetry  │───────────▶│ SyncOrchestrator │─────────▶│ RemoteApi │ │
//! │  │ (MQTT)     │  10s cycle │  health probe    │          │ (HTTP or  │ │
//! │  └────────────┘            │  reference pull  │          │  test     │ │
//! │                            │  push sync       │          │  double)  │ │
//! │                            └──────────────────┘          └───────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The station works fully offline; this crate only ever improves on that
//! baseline. Sync failures are recorded status, never operator errors.

pub mod error;
pub mod orchestrator;
pub mod push;
pub mod reference;
pub mod remote;
pub mod telemetry;

pub use error::{SyncError, SyncResult};
pub use orchestrator::SyncOrchestrator;
pub use remote::{HttpRemote, PushEnvelope, PushPayload, RemoteApi, RemoteReference};
pub use telemetry::{Telemetry, TelemetryHandle, DATA_TOPIC, STATUS_TOPIC};
