//! Data models for the file ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---

/// One row as read from a file: every cell kept as its raw string so that
/// malformed values survive for row-level diagnosis. Blank cells and
/// NA-equivalent tokens have already been normalized to `None`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RawRecord {
    // ---
    pub sensor_id: Option<String>,
    pub timestamp: Option<String>,
    pub temperature: Option<String>,
    pub humidity: Option<String>,
    pub pressure: Option<String>,
}

/// A fully validated and coerced reading. Only constructed once the whole
/// file has passed strict validation, so every field is present and typed.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    // ---
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
}

/// The three reading metrics aggregated per sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Temperature,
    Humidity,
    Pressure,
}

impl Metric {
    /// Fixed aggregation order for deterministic output.
    pub const ALL: [Metric; 3] = [Metric::Temperature, Metric::Humidity, Metric::Pressure];

    pub fn name(&self) -> &'static str {
        // ---
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Pressure => "pressure",
        }
    }

    /// The metric's value within one reading.
    pub fn value(&self, reading: &SensorReading) -> f64 {
        // ---
        match self {
            Metric::Temperature => reading.temperature,
            Metric::Humidity => reading.humidity,
            Metric::Pressure => reading.pressure,
        }
    }
}

/// Per-sensor, per-metric statistics for one ingested file.
///
/// Uniquely keyed by `(sensor_id, file_name, metric_name, aggregation_time)`
/// so that re-persisting the same file is an upsert, not a duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    // ---
    pub sensor_id: String,
    pub file_name: String,
    /// Earliest timestamp among the sensor's rows in this file.
    pub aggregation_time: DateTime<Utc>,
    pub metric_name: &'static str,
    pub min_value: f64,
    pub max_value: f64,
    pub avg_value: f64,
    /// Sample standard deviation; 0.0 when only one sample.
    pub std_dev_value: f64,
    pub record_count: i32,
}
