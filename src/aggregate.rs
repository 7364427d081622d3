//! Per-sensor, per-metric aggregation over one validated file.

use std::collections::BTreeMap;

use crate::models::{AggregateRecord, Metric, SensorReading};

// ---

/// Compute one [`AggregateRecord`] per (sensor, metric) pair present in the
/// file.
///
/// `aggregation_time` is the earliest timestamp among the sensor's rows in
/// this file, shared by all three of the sensor's metric records. Pure and
/// deterministic: sensors are emitted in sorted order and metrics in their
/// fixed declaration order, so running this twice on the same rows yields
/// identical output.
pub fn aggregate(rows: &[SensorReading], file_name: &str) -> Vec<AggregateRecord> {
    // ---
    let mut groups: BTreeMap<&str, Vec<&SensorReading>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.sensor_id.as_str()).or_default().push(row);
    }

    let mut records = Vec::new();
    for (sensor_id, group) in groups {
        let Some(aggregation_time) = group.iter().map(|r| r.timestamp).min() else {
            continue;
        };

        for metric in Metric::ALL {
            let samples: Vec<f64> = group.iter().map(|r| metric.value(r)).collect();
            if samples.is_empty() {
                continue;
            }

            records.push(AggregateRecord {
                sensor_id: sensor_id.to_string(),
                file_name: file_name.to_string(),
                aggregation_time,
                metric_name: metric.name(),
                min_value: samples.iter().copied().fold(f64::INFINITY, f64::min),
                max_value: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                avg_value: mean(&samples),
                std_dev_value: sample_std_dev(&samples),
                record_count: samples.len() as i32,
            });
        }
    }

    records
}

fn mean(samples: &[f64]) -> f64 {
    // ---
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Sample standard deviation (n − 1 denominator), defined as 0.0 for a
/// single sample instead of propagating a not-a-number.
fn sample_std_dev(samples: &[f64]) -> f64 {
    // ---
    if samples.len() < 2 {
        return 0.0;
    }
    let m = mean(samples);
    let variance =
        samples.iter().map(|s| (s - m).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
    variance.sqrt()
}
