//! Strict row and file validation.
//!
//! A single invalid row invalidates the entire file: downstream aggregation
//! and storage must only ever see fully-consistent data, so partial ingestion
//! of a part-valid file is disallowed. The row-level check still collects
//! every reason for the offending row before the file short-circuits.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::config::{FieldBounds, ReadingBounds};
use crate::models::{RawRecord, SensorReading};
use crate::table::RawTable;

// ---

/// Validation outcome for one file. Produced once per file, never partial.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// Every row passed; all cells coerced to their final types.
    Valid(Vec<SensorReading>),
    /// The file failed; ordered reasons for the quarantine log.
    Invalid(Vec<String>),
}

/// Validate every row of a parsed table, all-or-nothing.
///
/// Order of checks:
/// 1. Required columns present (missing ones fail the file immediately).
/// 2. At least one data row.
/// 3. Rows in file order; the first failing row fails the file with that
///    row's full reason set. Display indices are 1-based and count the
///    header line, so the first data row is row 2.
/// 4. A bulk coercion pass over the now-known-good cells; a failure here
///    also invalidates the file.
pub fn validate_file(table: &RawTable, bounds: &ReadingBounds) -> FileOutcome {
    // ---
    let missing = table.missing_columns();
    if !missing.is_empty() {
        return FileOutcome::Invalid(vec![format!(
            "Missing critical columns: {}.",
            missing.join(", ")
        )]);
    }

    if table.rows.is_empty() {
        return FileOutcome::Invalid(vec![
            "File is empty or contains only headers after NA filtering.".to_string(),
        ]);
    }

    for (index, record) in table.rows.iter().enumerate() {
        let display_index = index + 2;
        let row_errors = validate_row(display_index, record, bounds);
        if !row_errors.is_empty() {
            let row_json = serde_json::to_string(record)
                .unwrap_or_else(|_| "<unserializable>".to_string());
            tracing::error!(
                "Row {} failed validation. Errors: {}. Data: {}",
                display_index,
                row_errors.join("; "),
                row_json
            );
            return FileOutcome::Invalid(vec![format!(
                "Validation failed at row {}: {}",
                display_index,
                row_errors.join("; ")
            )]);
        }
    }

    // Bulk coercion. Unreachable failures given the per-row checks above,
    // but a coercion error still invalidates the whole file.
    let mut readings = Vec::with_capacity(table.rows.len());
    for record in &table.rows {
        match coerce_record(record) {
            Ok(reading) => readings.push(reading),
            Err(e) => {
                return FileOutcome::Invalid(vec![format!(
                    "Error during bulk transformation after validation: {e}."
                )]);
            }
        }
    }

    FileOutcome::Valid(readings)
}

/// Validate one row against the configured bounds.
///
/// Returns the full set of reasons for this row (empty means pass); the
/// short-circuit across rows is the file validator's policy, not this one's.
pub fn validate_row(
    display_index: usize,
    record: &RawRecord,
    bounds: &ReadingBounds,
) -> Vec<String> {
    // ---
    let mut errors = Vec::new();

    if record.sensor_id.is_none() {
        errors.push(format!("Row {display_index}: 'sensor_id' is null."));
    }

    match &record.timestamp {
        None => errors.push(format!(
            "Row {display_index}: 'timestamp' string is null/empty."
        )),
        Some(raw) => {
            if parse_timestamp(raw).is_none() {
                errors.push(format!(
                    "Row {display_index}: 'timestamp' ('{raw}') is unparsable."
                ));
            }
        }
    }

    check_numeric(
        display_index,
        "temperature",
        &record.temperature,
        &bounds.temperature,
        &mut errors,
    );
    check_numeric(
        display_index,
        "humidity",
        &record.humidity,
        &bounds.humidity,
        &mut errors,
    );
    check_numeric(
        display_index,
        "pressure",
        &record.pressure,
        &bounds.pressure,
        &mut errors,
    );

    errors
}

/// Presence, parse, and inclusive-range check for one numeric cell.
fn check_numeric(
    display_index: usize,
    field: &str,
    cell: &Option<String>,
    bounds: &FieldBounds,
    errors: &mut Vec<String>,
) {
    // ---
    let Some(raw) = cell else {
        errors.push(format!("Row {display_index}: '{field}' is null."));
        return;
    };

    match raw.parse::<f64>() {
        Ok(value) => {
            if !bounds.contains(value) {
                errors.push(format!(
                    "Row {display_index}: '{field}' ({value:?}) out of range [{:?}, {:?}].",
                    bounds.min, bounds.max
                ));
            }
        }
        Err(_) => {
            errors.push(format!(
                "Row {display_index}: '{field}' ('{raw}') is not a valid number."
            ));
        }
    }
}

/// Parse a timestamp cell to an absolute instant.
///
/// Accepts RFC 3339, `Y-m-d H:M:S` / `Y-m-dTH:M:S` with optional fractional
/// seconds, and a bare date. Naive forms are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    // ---
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// Coerce a validated record to its final types.
fn coerce_record(record: &RawRecord) -> Result<SensorReading, String> {
    // ---
    let sensor_id = record
        .sensor_id
        .clone()
        .ok_or("'sensor_id' missing during coercion")?;
    let timestamp = record
        .timestamp
        .as_deref()
        .and_then(parse_timestamp)
        .ok_or("'timestamp' unparsable during coercion")?;
    let temperature = coerce_number(&record.temperature, "temperature")?;
    let humidity = coerce_number(&record.humidity, "humidity")?;
    let pressure = coerce_number(&record.pressure, "pressure")?;

    Ok(SensorReading {
        sensor_id,
        timestamp,
        temperature,
        humidity,
        pressure,
    })
}

fn coerce_number(cell: &Option<String>, field: &str) -> Result<f64, String> {
    // ---
    cell.as_deref()
        .and_then(|raw| raw.parse::<f64>().ok())
        .ok_or_else(|| format!("'{field}' not numeric during coercion"))
}
