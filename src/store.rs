//! Persistence gateway.
//!
//! One database connection per file, one transaction per file. The
//! transaction covers both tables: every raw row inserted, every aggregate
//! upserted. Either write failing rolls back the whole transaction, so a
//! partial raw/aggregate write is never visible.

use sqlx::{Connection, PgConnection, Postgres, Transaction};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{AggregateRecord, SensorReading};

// ---

/// Open a database connection with a fixed-delay retry loop.
///
/// Exhausting the configured attempts returns the last error; the caller
/// must leave the source file untouched for a later retry, since the data
/// itself is not at fault.
pub async fn connect(cfg: &Config) -> Result<PgConnection> {
    // ---
    let mut attempt = 0;
    loop {
        attempt += 1;
        match PgConnection::connect(&cfg.db_url).await {
            Ok(conn) => {
                tracing::info!("Successfully connected to database.");
                return Ok(conn);
            }
            Err(e) => {
                tracing::error!(
                    "Database connection failed (attempt {}/{}): {}",
                    attempt,
                    cfg.db_connect_retries,
                    e
                );
                if attempt >= cfg.db_connect_retries {
                    tracing::error!("Max retry attempts reached for DB connection.");
                    return Err(Error::Db(e));
                }
                tracing::info!("Retrying in {:?}...", cfg.db_retry_delay);
                tokio::time::sleep(cfg.db_retry_delay).await;
            }
        }
    }
}

/// Store one file's raw rows and aggregates in a single transaction.
pub async fn store(
    conn: &mut PgConnection,
    rows: &[SensorReading],
    aggregates: &[AggregateRecord],
    file_name: &str,
) -> Result<()> {
    // ---
    let mut tx = conn.begin().await?;

    match write_all(&mut tx, rows, aggregates, file_name).await {
        Ok(()) => {
            tx.commit().await?;
            Ok(())
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(
                    "Error during rollback for '{}': {}",
                    file_name,
                    rollback_err
                );
            }
            Err(e)
        }
    }
}

async fn write_all(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[SensorReading],
    aggregates: &[AggregateRecord],
    file_name: &str,
) -> Result<()> {
    // ---
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO raw_sensor_data (
                sensor_id, timestamp, temperature, humidity, pressure, file_name
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&row.sensor_id)
        .bind(row.timestamp)
        .bind(row.temperature)
        .bind(row.humidity)
        .bind(row.pressure)
        .bind(file_name)
        .execute(&mut **tx)
        .await?;
    }
    tracing::info!(
        "File '{}': Inserted {} rows into 'raw_sensor_data'.",
        file_name,
        rows.len()
    );

    for agg in aggregates {
        sqlx::query(
            r#"
            INSERT INTO aggregated_sensor_data (
                sensor_id, file_name, aggregation_time, metric_name,
                min_value, max_value, avg_value, std_dev_value, record_count
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (sensor_id, file_name, metric_name, aggregation_time) DO UPDATE SET
                min_value = EXCLUDED.min_value,
                max_value = EXCLUDED.max_value,
                avg_value = EXCLUDED.avg_value,
                std_dev_value = EXCLUDED.std_dev_value,
                record_count = EXCLUDED.record_count,
                processed_at = NOW()
            "#,
        )
        .bind(&agg.sensor_id)
        .bind(&agg.file_name)
        .bind(agg.aggregation_time)
        .bind(agg.metric_name)
        .bind(agg.min_value)
        .bind(agg.max_value)
        .bind(agg.avg_value)
        .bind(agg.std_dev_value)
        .bind(agg.record_count)
        .execute(&mut **tx)
        .await?;
    }
    tracing::info!(
        "File '{}': Inserted/Updated {} rows in 'aggregated_sensor_data'.",
        file_name,
        aggregates.len()
    );

    Ok(())
}
