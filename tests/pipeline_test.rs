//! End-to-end lifecycle tests for the file pipeline.
//!
//! These run the real controller against temporary directories and an
//! unreachable database, exercising every disposition that does not require
//! a live PostgreSQL instance: quarantine routing with its reason log,
//! transient-failure retention, and the vanished-file race.

use std::path::Path;
use std::time::Duration;

use sensorflow_ingest::config::{Config, FieldBounds, ReadingBounds};
use sensorflow_ingest::pipeline::{self, Disposition};

// ---

fn test_config(root: &Path) -> Config {
    // ---
    let data_dir = root.join("data");
    let quarantine_dir = root.join("quarantine");
    let processed_dir = root.join("processed");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::create_dir_all(&quarantine_dir).unwrap();
    std::fs::create_dir_all(&processed_dir).unwrap();

    Config {
        // Nothing listens on port 9; connection attempts fail fast
        db_url: "postgres://pipeline:pw@127.0.0.1:9/sensors".to_string(),
        data_dir,
        quarantine_dir,
        processed_dir,
        scan_interval: Duration::from_secs(5),
        settle_delay: Duration::ZERO,
        db_connect_retries: 2,
        db_retry_delay: Duration::ZERO,
        bounds: ReadingBounds {
            temperature: FieldBounds {
                min: -50.0,
                max: 50.0,
            },
            humidity: FieldBounds { min: 0.0, max: 1.0 },
            pressure: FieldBounds {
                min: 900.0,
                max: 1100.0,
            },
        },
        na_tokens: vec!["N/A".to_string(), "NULL".to_string(), "nan".to_string()],
        inflight_max_entries: 16,
        inflight_max_age: Duration::from_secs(300),
    }
}

fn drop_file(cfg: &Config, name: &str, content: &str) -> std::path::PathBuf {
    // ---
    let path = cfg.data_dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn quarantine_log(cfg: &Config) -> String {
    // ---
    std::fs::read_to_string(cfg.quarantine_dir.join("quarantine_log.txt")).unwrap_or_default()
}

const VALID_CSV: &str = "timestamp,sensor_id,temperature,humidity,pressure\n\
                         2025-03-26T10:00:00Z,sensor-001,21.5,0.45,1013.2\n\
                         2025-03-26T10:05:00Z,sensor-001,22.0,0.46,1013.0\n\
                         2025-03-26T10:00:00Z,sensor-002,18.3,0.51,1009.8\n";

// ---

#[tokio::test]
async fn db_unreachable_retains_file_in_data_dir() {
    // ---
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());
    let path = drop_file(&cfg, "batch_01.csv", VALID_CSV);

    let disposition = pipeline::process_file(&cfg, &path).await;

    assert_eq!(disposition, Disposition::Retained);
    // The data is not at fault: no quarantine, no processed move
    assert!(path.exists());
    assert!(!cfg.quarantine_dir.join("batch_01.csv").exists());
    assert!(!cfg.processed_dir.join("batch_01.csv").exists());
    assert!(quarantine_log(&cfg).is_empty());
}

#[tokio::test]
async fn null_sensor_id_quarantines_with_row_reason() {
    // ---
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());
    let path = drop_file(
        &cfg,
        "batch_02.csv",
        "timestamp,sensor_id,temperature,humidity,pressure\n\
         2025-03-26T10:00:00Z,sensor-001,21.5,0.45,1013.2\n\
         2025-03-26T10:05:00Z,,22.0,0.46,1013.0\n",
    );

    let disposition = pipeline::process_file(&cfg, &path).await;

    assert_eq!(disposition, Disposition::Quarantined);
    assert!(!path.exists());
    assert!(cfg.quarantine_dir.join("batch_02.csv").exists());

    let log = quarantine_log(&cfg);
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("File: batch_02.csv"));
    // The empty sensor_id is on the second data row, file row 3
    assert!(log.contains("Validation failed at row 3"));
    assert!(log.contains("'sensor_id' is null"));
}

#[tokio::test]
async fn out_of_range_temperature_quarantines_with_bounds_in_reason() {
    // ---
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());
    let path = drop_file(
        &cfg,
        "batch_03.csv",
        "timestamp,sensor_id,temperature,humidity,pressure\n\
         2025-03-26T10:00:00Z,sensor-001,999,0.45,1013.2\n",
    );

    let disposition = pipeline::process_file(&cfg, &path).await;

    assert_eq!(disposition, Disposition::Quarantined);
    let log = quarantine_log(&cfg);
    assert!(log.contains("'temperature' (999.0) out of range [-50.0, 50.0]"));
}

#[tokio::test]
async fn empty_file_quarantines_with_dedicated_reason() {
    // ---
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());
    let path = drop_file(&cfg, "batch_04.csv", "");

    let disposition = pipeline::process_file(&cfg, &path).await;

    assert_eq!(disposition, Disposition::Quarantined);
    assert!(cfg.quarantine_dir.join("batch_04.csv").exists());
    assert!(quarantine_log(&cfg).contains("File is empty or contains only headers"));
}

#[tokio::test]
async fn header_only_file_quarantines_as_empty() {
    // ---
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());
    let path = drop_file(
        &cfg,
        "batch_05.csv",
        "timestamp,sensor_id,temperature,humidity,pressure\n",
    );

    let disposition = pipeline::process_file(&cfg, &path).await;

    assert_eq!(disposition, Disposition::Quarantined);
    assert!(quarantine_log(&cfg).contains("File is empty or contains only headers"));
}

#[tokio::test]
async fn missing_columns_quarantine_names_them() {
    // ---
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());
    let path = drop_file(
        &cfg,
        "batch_06.csv",
        "timestamp,sensor_id,humidity\n\
         2025-03-26T10:00:00Z,sensor-001,0.45\n",
    );

    let disposition = pipeline::process_file(&cfg, &path).await;

    assert_eq!(disposition, Disposition::Quarantined);
    assert!(quarantine_log(&cfg).contains("Missing critical columns: temperature, pressure."));
}

#[tokio::test]
async fn na_token_cells_fail_presence_not_parsing() {
    // ---
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());
    let path = drop_file(
        &cfg,
        "batch_07.csv",
        "timestamp,sensor_id,temperature,humidity,pressure\n\
         2025-03-26T10:00:00Z,sensor-001,N/A,0.45,1013.2\n",
    );

    pipeline::process_file(&cfg, &path).await;

    let log = quarantine_log(&cfg);
    assert!(log.contains("'temperature' is null"));
    assert!(!log.contains("not a valid number"));
}

#[tokio::test]
async fn vanished_file_is_skipped_not_quarantined() {
    // ---
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());
    let path = cfg.data_dir.join("never_existed.csv");

    let disposition = pipeline::process_file(&cfg, &path).await;

    assert_eq!(disposition, Disposition::Vanished);
    assert!(quarantine_log(&cfg).is_empty());
}

#[tokio::test]
async fn working_copies_are_cleaned_up() {
    // ---
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());

    // One quarantined file, one retained file
    let bad = drop_file(&cfg, "bad.csv", "timestamp,sensor_id\nx,y\n");
    let good = drop_file(&cfg, "good.csv", VALID_CSV);
    pipeline::process_file(&cfg, &bad).await;
    pipeline::process_file(&cfg, &good).await;

    let leftovers: Vec<_> = std::fs::read_dir(&cfg.data_dir)
        .unwrap()
        .flatten()
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with(pipeline::WORKING_PREFIX)
        })
        .collect();
    assert!(leftovers.is_empty(), "working copies left behind: {leftovers:?}");
}

#[tokio::test]
async fn quarantine_log_accumulates_one_line_per_file() {
    // ---
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());

    for (i, name) in ["a.csv", "b.csv", "c.csv"].iter().enumerate() {
        let path = drop_file(&cfg, name, "");
        pipeline::process_file(&cfg, &path).await;
        assert_eq!(quarantine_log(&cfg).lines().count(), i + 1);
    }
}
