//! File lifecycle controller.
//!
//! Owns everything between a "file appeared" signal and the file's final
//! placement: claim dedup, copy-read, validation, aggregation, persistence,
//! and relocation to the processed or quarantine area. A file is never
//! deleted outright; it is always relocated or left in place for retry.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::aggregate;
use crate::config::Config;
use crate::error::Result;
use crate::store;
use crate::table;
use crate::validate::{self, FileOutcome};

// ---

/// Prefix marking in-progress working copies; trigger filters ignore it.
pub const WORKING_PREFIX: &str = "processing_";

/// Final placement of one processed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Data stored; file moved to the processed area.
    Processed,
    /// File moved to quarantine with a recorded reason.
    Quarantined,
    /// Transient infrastructure failure; file left in place for a later
    /// re-scan.
    Retained,
    /// File disappeared between discovery and read; nothing to do.
    Vanished,
}

/// Claim cache preventing a file from being processed twice when the event
/// watcher and the periodic scan both observe it.
///
/// Bounded two ways: entries expire after `max_age` (so a file retained for
/// retry becomes claimable again), and once `max_entries` is reached the
/// oldest claim is evicted to make room.
pub struct InFlight {
    // ---
    entries: HashMap<PathBuf, Instant>,
    max_entries: usize,
    max_age: Duration,
}

impl InFlight {
    pub fn new(max_entries: usize, max_age: Duration) -> Self {
        // ---
        Self {
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            max_age,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.inflight_max_entries, cfg.inflight_max_age)
    }

    /// Claim a path. Returns `false` if it is already in flight.
    pub fn claim(&mut self, path: &Path) -> bool {
        // ---
        self.evict_expired();
        if self.entries.contains_key(path) {
            return false;
        }
        if self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        self.entries.insert(path.to_path_buf(), Instant::now());
        true
    }

    /// Drop a claim, making the path immediately claimable again. Used when
    /// a file vanishes before processing.
    pub fn release(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_expired(&mut self) {
        // ---
        let max_age = self.max_age;
        self.entries.retain(|_, claimed_at| claimed_at.elapsed() <= max_age);
    }

    fn evict_oldest(&mut self) {
        // ---
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, claimed_at)| **claimed_at)
            .map(|(path, _)| path.clone());
        if let Some(path) = oldest {
            debug!("In-flight cache full; evicting oldest claim: {}", path.display());
            self.entries.remove(&path);
        }
    }
}

/// Whether a path is a candidate for processing: a `.csv` file that is not
/// one of our own working copies.
pub fn eligible(path: &Path) -> bool {
    // ---
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".csv") && !name.starts_with(WORKING_PREFIX)
}

/// Run one file through the full pipeline and return its final placement.
///
/// Every outcome is logged with the file name and reason before the
/// relocation it accompanies. Transient infrastructure failures retain the
/// file; every other failure quarantines it with the error text as reason.
pub async fn process_file(cfg: &Config, path: &Path) -> Disposition {
    // ---
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
        warn!("Ignoring path with no usable file name: {}", path.display());
        return Disposition::Vanished;
    };

    info!("Processing file: {}", path.display());
    if !path.exists() {
        warn!("File '{}' no longer exists. Skipping.", path.display());
        return Disposition::Vanished;
    }

    match run_stages(cfg, path, &file_name).await {
        Ok(disposition) => disposition,
        Err(e) if e.is_retryable() => {
            error!(
                "Failed to store data for '{}': {}. File remains in data folder for retry.",
                file_name, e
            );
            Disposition::Retained
        }
        Err(e) => {
            error!("Unhandled error processing file '{}': {}", file_name, e);
            quarantine(cfg, path, &file_name, &format!("Unhandled processing error: {e}"))
        }
    }
}

async fn run_stages(cfg: &Config, path: &Path, file_name: &str) -> Result<Disposition> {
    // ---
    let work = working_path(path, file_name);
    match tokio::fs::copy(path, &work).await {
        Ok(_) => {
            debug!(
                "Copied '{}' to '{}' for processing.",
                file_name,
                work.display()
            );
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("File '{}' not found during processing.", path.display());
            return Ok(Disposition::Vanished);
        }
        Err(e) => return Err(e.into()),
    }

    // Parse the working copy, then remove it on every exit path before
    // acting on the outcome.
    let parsed = table::read_raw_table(&work, &cfg.na_tokens);
    if let Err(e) = tokio::fs::remove_file(&work).await {
        warn!("Error removing working copy {}: {}", work.display(), e);
    }

    let raw_table = match parsed {
        Ok(t) => t,
        Err(e) => {
            return Ok(quarantine(
                cfg,
                path,
                file_name,
                &format!("CSV parsing error: {e}"),
            ));
        }
    };

    // A structurally empty table never reaches validation; it gets the
    // dedicated empty-file reason even when the header itself is missing.
    if raw_table.rows.is_empty() {
        warn!("File '{}' is empty. Quarantining original.", file_name);
        return Ok(quarantine(
            cfg,
            path,
            file_name,
            "File is empty or contains only headers after NA filtering.",
        ));
    }

    let rows = match validate::validate_file(&raw_table, &cfg.bounds) {
        FileOutcome::Invalid(reasons) => {
            let summary = reasons.join("; ");
            warn!(
                "Strict validation failed for '{}'. Quarantining. Summary: {}",
                file_name, summary
            );
            return Ok(quarantine(cfg, path, file_name, &summary));
        }
        FileOutcome::Valid(rows) => rows,
    };
    info!(
        "File '{}': All {} rows passed strict validation.",
        file_name,
        rows.len()
    );

    let aggregates = aggregate::aggregate(&rows, file_name);

    let mut conn = store::connect(cfg).await?;
    store::store(&mut conn, &rows, &aggregates, file_name).await?;

    info!(
        "Successfully stored data from '{}'. Moving to processed.",
        file_name
    );
    move_file(path, &cfg.processed_dir, file_name)?;
    Ok(Disposition::Processed)
}

/// Quarantine a file: append the reason to the quarantine log, then move
/// the file.
fn quarantine(cfg: &Config, path: &Path, file_name: &str, reason: &str) -> Disposition {
    // ---
    log_quarantine_reason(cfg, file_name, reason);
    if let Err(e) = move_file(path, &cfg.quarantine_dir, file_name) {
        error!("Could not move '{}' to quarantine: {}", file_name, e);
    }
    Disposition::Quarantined
}

/// Append one `<ISO timestamp> - File: <name>, Reason: <reason>` line to the
/// quarantine log.
fn log_quarantine_reason(cfg: &Config, file_name: &str, reason: &str) {
    // ---
    let log_path = cfg.quarantine_dir.join("quarantine_log.txt");
    let line = format!(
        "{} - File: {}, Reason: {}\n",
        Utc::now().to_rfc3339(),
        file_name,
        reason
    );

    let written = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .and_then(|mut f| f.write_all(line.as_bytes()));
    if let Err(e) = written {
        error!("Failed to write to quarantine log for {}: {}", file_name, e);
    }
    warn!("File '{}' moved to quarantine. Reason: {}", file_name, reason);
}

/// Working-copy path beside the original, carrying the ignored prefix and a
/// timestamp so concurrent copies of same-named files cannot collide.
fn working_path(path: &Path, file_name: &str) -> PathBuf {
    // ---
    let stamp = Utc::now().format("%Y%m%d%H%M%S%f");
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{WORKING_PREFIX}{file_name}_{stamp}"))
}

/// Move a file into a directory, falling back to copy+remove when a plain
/// rename is not possible (cross-device destinations).
fn move_file(from: &Path, to_dir: &Path, file_name: &str) -> std::io::Result<PathBuf> {
    // ---
    let dest = to_dir.join(file_name);
    match std::fs::rename(from, &dest) {
        Ok(()) => Ok(dest),
        Err(_) => {
            std::fs::copy(from, &dest)?;
            std::fs::remove_file(from)?;
            Ok(dest)
        }
    }
}
