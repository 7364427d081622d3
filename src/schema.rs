//! Database schema management for `codemetal-sensorflow-ingest`.
//!
//! Ensures required tables and indexes exist before the watch loop starts.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::{Connection, PgConnection};

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `raw_sensor_data` table holding every ingested reading and
/// the `aggregated_sensor_data` table holding per-sensor/per-metric
/// statistics, with the unique constraint the aggregate upsert relies on.
/// Safe to call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(conn: &mut PgConnection) -> Result<()> {
    // ---
    let mut tx = conn.begin().await?;

    // One row per ingested reading, carrying the originating file name
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_sensor_data (
            id           BIGSERIAL PRIMARY KEY,
            sensor_id    TEXT             NOT NULL,
            timestamp    TIMESTAMPTZ      NOT NULL,
            temperature  DOUBLE PRECISION NOT NULL,
            humidity     DOUBLE PRECISION NOT NULL,
            pressure     DOUBLE PRECISION NOT NULL,
            file_name    TEXT             NOT NULL,
            inserted_at  TIMESTAMPTZ      NOT NULL DEFAULT NOW()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // One row per sensor/file/metric/aggregation_time; the unique
    // constraint makes re-ingestion an upsert instead of a duplicate
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS aggregated_sensor_data (
            id               BIGSERIAL PRIMARY KEY,
            sensor_id        TEXT             NOT NULL,
            file_name        TEXT             NOT NULL,
            aggregation_time TIMESTAMPTZ      NOT NULL,
            metric_name      TEXT             NOT NULL,
            min_value        DOUBLE PRECISION NOT NULL,
            max_value        DOUBLE PRECISION NOT NULL,
            avg_value        DOUBLE PRECISION NOT NULL,
            std_dev_value    DOUBLE PRECISION NOT NULL,
            record_count     INTEGER          NOT NULL,
            processed_at     TIMESTAMPTZ      NOT NULL DEFAULT NOW(),
            CONSTRAINT uq_aggregate
                UNIQUE (sensor_id, file_name, metric_name, aggregation_time)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Basic indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_raw_sensor_data_sensor_id
            ON raw_sensor_data (sensor_id);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_raw_sensor_data_file_name
            ON raw_sensor_data (file_name);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
