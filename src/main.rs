//! Application entry point for the `codemetal-sensorflow-ingest` service.
//!
//! This binary orchestrates the full startup sequence for the file-based
//! sensor ingestion pipeline, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Creating the data/quarantine/processed directories
//! - Creating the database schema if it does not exist (best effort; the
//!   pipeline retains files until the database is reachable)
//! - Running the watch loop (filesystem events + periodic re-scan) until
//!   interrupted
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `DATA_DIR`/`QUARANTINE_DIR`/`PROCESSED_DIR` (optional) – pipeline dirs
//! - `PIPELINE_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `PIPELINE_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! This module follows the Explicit Module Boundary Pattern (EMBP) by
//! delegating schema setup to `schema`, configuration parsing to `config`,
//! and the processing loop to `watch`.
use std::{env, io::IsTerminal};

use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use sensorflow_ingest::{config, schema, store, watch};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    std::fs::create_dir_all(&cfg.data_dir)?;
    std::fs::create_dir_all(&cfg.quarantine_dir)?;
    std::fs::create_dir_all(&cfg.processed_dir)?;

    tracing::info!("==================================================");
    tracing::info!("Starting file ingestion pipeline (strict validation)...");

    // Best-effort schema bootstrap. An unreachable database is not fatal
    // here: files are retained in the data folder until it comes back.
    match store::connect(&cfg).await {
        Ok(mut conn) => schema::create_schema(&mut conn).await?,
        Err(e) => {
            tracing::warn!(
                "Could not connect to database at startup: {}. \
                 Schema setup deferred; incoming files will be retained.",
                e
            );
        }
    }

    watch::run(&cfg).await?;

    tracing::info!("Pipeline shut down gracefully.");
    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `PIPELINE_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `PIPELINE_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked. It installs the subscriber globally
/// for the lifetime of the process.
fn init_tracing() {
    // ---
    let span_events = match env::var("PIPELINE_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to PIPELINE_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("PIPELINE_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
