//! Library gateway for the `codemetal-sensorflow-ingest` service.
//!
//! The binary in `main.rs` only touches this gateway; everything else is a
//! sibling module behind it (EMBP pattern). The pipeline is a one-way flow:
//!
//! ```text
//! watch (events + periodic scan)
//!   -> pipeline (claim, copy-read, route)
//!     -> table (raw string cells)
//!     -> validate (all-or-nothing)
//!     -> aggregate (per sensor/metric stats)
//!     -> store (one transaction per file)
//!   -> relocation (processed | quarantine | left in place)
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod table;
pub mod validate;
pub mod watch;

pub use config::Config;
pub use error::{Error, Result};

// Re-exported so the binary and integration tests never need to know which
// sibling module owns which type, only the gateway.
pub use models::{AggregateRecord, Metric, RawRecord, SensorReading};
pub use pipeline::{Disposition, InFlight};
pub use validate::FileOutcome;
