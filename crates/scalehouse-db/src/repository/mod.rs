//! Repository modules, one per ledger concern.

pub mod auth;
pub mod reference;
pub mod transaction;
