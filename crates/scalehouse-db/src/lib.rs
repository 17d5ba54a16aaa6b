//! # scalehouse-db
//!
//! SQLite ledger for the weighbridge edge agent.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          scalehouse-db                                  │
//! │                                                                         │
//! │  ┌──────────────┐     ┌──────────────────────────────────────────────┐ │
//! │  │   Database   │────▶│               Repositories                   │ │
//! │  │  ──────────  │     │  ┌────────────────┐  ┌────────────────────┐  │ │
//! │  │  pool (WAL)  │     │  │  transactions  │  │  references        │  │ │
//! │  │  create gate │     │  │  (the ledger)  │  │  (remote mirror)   │  │ │
//! │  │  migrations  │     │  └────────────────┘  └────────────────────┘  │ │
//! │  └──────────────┘     │  ┌────────────────┐                          │ │
//! │                       │  │  auth          │                          │ │
//! │                       │  │  (credentials) │                          │ │
//! │                       │  └────────────────┘                          │ │
//! │                       └──────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger is the source of truth for weighing transactions. Rows are
//! never deleted: completion, sync acknowledgment, and correction are all
//! status transitions on the same row.

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::auth::{AuthRepository, CredentialCheck};
pub use repository::reference::{ReferenceEntry, ReferenceRepository};
pub use repository::transaction::TransactionRepository;
