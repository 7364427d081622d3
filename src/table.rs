//! Raw table reader.
//!
//! Files are parsed as tables of raw string cells so that every value,
//! including malformed ones, survives for row-level diagnosis instead of
//! being coerced or destroyed by an eager parser. Blank cells and
//! NA-equivalent tokens are normalized to `None` here; type coercion happens
//! only after the whole file has passed validation.

use std::fs::File;
use std::path::Path;

use csv::ReaderBuilder;

use crate::error::Result;
use crate::models::RawRecord;

// ---

/// Header columns every file must carry.
pub const REQUIRED_COLUMNS: [&str; 5] =
    ["timestamp", "sensor_id", "temperature", "humidity", "pressure"];

/// One parsed file: the header row plus every data row as raw cells.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    // ---
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    /// Required columns absent from the header, in declaration order.
    pub fn missing_columns(&self) -> Vec<&'static str> {
        // ---
        REQUIRED_COLUMNS
            .iter()
            .filter(|col| !self.headers.iter().any(|h| h == *col))
            .copied()
            .collect()
    }
}

/// Read `path` into a [`RawTable`].
///
/// Rows shorter than the header are padded with `None`; columns beyond the
/// required set are ignored. A structurally broken file (unreadable,
/// malformed CSV framing) returns an error; an empty or header-only file
/// returns a table with zero rows, which the caller treats as invalid.
pub fn read_raw_table(path: &Path, na_tokens: &[String]) -> Result<RawTable> {
    // ---
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(file);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let index_of = |col: &str| headers.iter().position(|h| h == col);
    let sensor_id_idx = index_of("sensor_id");
    let timestamp_idx = index_of("timestamp");
    let temperature_idx = index_of("temperature");
    let humidity_idx = index_of("humidity");
    let pressure_idx = index_of("pressure");

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .and_then(|raw| normalize_cell(raw, na_tokens))
        };

        rows.push(RawRecord {
            sensor_id: cell(sensor_id_idx),
            timestamp: cell(timestamp_idx),
            temperature: cell(temperature_idx),
            humidity: cell(humidity_idx),
            pressure: cell(pressure_idx),
        });
    }

    Ok(RawTable { headers, rows })
}

/// Blank cells and configured NA tokens become `None`; everything else is
/// kept verbatim.
fn normalize_cell(raw: &str, na_tokens: &[String]) -> Option<String> {
    // ---
    if raw.is_empty() || na_tokens.iter().any(|t| t == raw) {
        return None;
    }
    Some(raw.to_string())
}
