//! # scalehouse-serial
//!
//! Serial acquisition for the scale indicator: a single task that owns the
//! port, survives disconnects with a fixed backoff, and turns the raw line
//! stream into trusted stable readings via the core stabilizer.

pub mod error;
pub mod reader;

pub use error::{SerialError, SerialResult};
pub use reader::{ScaleReader, ScaleReaderHandle};
