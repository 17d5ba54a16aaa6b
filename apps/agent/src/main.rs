//! # Scalehouse Agent
//!
//! Edge agent for an industrial weighbridge station: reads the scale over
//! serial, keeps the local transaction ledger, mirrors reference data from
//! the remote authority, pushes finished transactions, and publishes
//! telemetry over MQTT.
//!
//! ## Startup Order
//! ```text
//! tracing ─▶ config ─▶ state store ─▶ database (FATAL on failure)
//!         ─▶ scale reader ─▶ sync orchestrator ─▶ telemetry ─▶ notifiers
//! ```
//!
//! The database is the only fatal dependency: without the ledger the agent
//! cannot record a single weighing. Every other channel degrades gracefully
//! and reconnects on its own.

mod console;
mod controller;
mod error;
mod events;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use controller::Controller;
use scalehouse_core::StabilizerConfig;
use scalehouse_db::{Database, DbConfig};
use scalehouse_serial::ScaleReader;
use scalehouse_store::{AgentConfig, StateStore};
use scalehouse_sync::{HttpRemote, SyncOrchestrator, Telemetry};

const CONFIG_FILE: &str = "agent-config.json";
const STATE_FILE: &str = "agent-state.json";
const LEDGER_FILE: &str = "scalehouse.db";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Scalehouse agent starting");

    let base_dir = std::env::var("SCALEHOUSE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));

    let config = match AgentConfig::load_or_init(&base_dir.join(CONFIG_FILE)) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Cannot load configuration");
            std::process::exit(1);
        }
    };

    let (store, _store_task) = StateStore::spawn(base_dir.join(STATE_FILE));

    // Fresh start: nothing is connected yet and the form is locked.
    if let Err(e) = store
        .update(|doc| {
            doc.mqtt.connected = false;
            doc.serial.connected = false;
            doc.server.reachable = false;
            doc.form_locked = true;
        })
        .await
    {
        error!(error = %e, "Cannot initialize state store");
        std::process::exit(1);
    }

    // The ledger is the one dependency the agent cannot live without.
    let db = match Database::new(DbConfig::new(base_dir.join(LEDGER_FILE))).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Cannot open transaction ledger, exiting");
            std::process::exit(1);
        }
    };

    let stabilizer_config = StabilizerConfig {
        suppress_repeat_emission: config.stabilizer.suppress_repeat_emission,
        ..StabilizerConfig::default()
    };
    let reader = match ScaleReader::spawn(
        config.serial.clone(),
        stabilizer_config,
        std::time::Duration::from_secs(config.intervals.serial_retry_secs),
        store.clone(),
    ) {
        Ok(reader) => reader,
        Err(e) => {
            error!(error = %e, "Unusable serial configuration");
            std::process::exit(1);
        }
    };

    let remote = match HttpRemote::new(&config.server.url) {
        Ok(remote) => remote,
        Err(e) => {
            error!(error = %e, "Cannot build remote API client");
            std::process::exit(1);
        }
    };
    let orchestrator = Arc::new(SyncOrchestrator::new(remote, db.clone(), store.clone()));

    let telemetry = Telemetry::spawn(
        config.mqtt.clone(),
        config.intervals.clone(),
        store.clone(),
        orchestrator.clone(),
    );

    let events = events::channel();
    let notifier_tasks = events::spawn_notifiers(events.clone(), store.clone(), &reader, &config);

    let station = config.mqtt.client_id.clone();
    let controller = Arc::new(Controller::new(
        db.clone(),
        store.clone(),
        reader,
        events,
        &config,
        station,
    ));

    let console_task = tokio::spawn(console::run(controller));

    info!("Scalehouse agent ready");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => error!(error = %e, "Cannot listen for shutdown signal"),
    }
    console_task.abort();

    // Orderly teardown: announce offline, stop sync, stop notifiers,
    // close the ledger.
    telemetry.shutdown().await;
    orchestrator.stop_sync().await;
    for task in notifier_tasks {
        task.abort();
    }
    db.close().await;

    info!("Scalehouse agent stopped");
}
