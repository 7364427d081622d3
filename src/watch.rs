//! Trigger sources for the pipeline.
//!
//! Two independent sources can observe the same file: filesystem event
//! notification on the watched directory, and a periodic full re-scan as a
//! fallback/catch-up mechanism (it also re-discovers files retained after a
//! transient storage failure). A single worker consumes both serially;
//! dedup between them is the controller's in-flight claim cache, not locks.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::{self, Disposition, InFlight};

// ---

/// Watch the data directory and process files until interrupted.
///
/// Startup order matches the recovery story: the watcher is registered
/// first so nothing arriving during the initial scan is missed, then the
/// initial scan picks up files that were already waiting.
///
/// # Errors
///
/// Returns an error if the watch backend cannot be created or started;
/// the caller treats that as fatal.
pub async fn run(cfg: &Config) -> Result<()> {
    // ---
    let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();

    let mut watcher = build_watcher(tx)?;
    watcher.watch(&cfg.data_dir, RecursiveMode::NonRecursive)?;
    info!("Monitoring folder: {}", cfg.data_dir.display());

    let mut inflight = InFlight::from_config(cfg);

    info!("Performing initial scan of data folder...");
    scan_directory(cfg, &mut inflight, "Initial scan").await;
    info!("Initial scan complete. Now monitoring...");

    let mut ticker = tokio::time::interval(cfg.scan_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial scan already ran.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Pipeline shutdown requested.");
                break;
            }
            Some(path) = rx.recv() => {
                handle_candidate(cfg, &mut inflight, &path, "Watcher").await;
            }
            _ = ticker.tick() => {
                scan_directory(cfg, &mut inflight, "Periodic scan").await;
            }
        }
    }

    // Dropping the watcher stops event delivery before the channel closes.
    drop(watcher);
    Ok(())
}

/// One pass over the watched directory, feeding every candidate through the
/// same claim-then-process path the event source uses.
async fn scan_directory(cfg: &Config, inflight: &mut InFlight, source: &str) {
    // ---
    let entries = match std::fs::read_dir(&cfg.data_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to scan {}: {}", cfg.data_dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        handle_candidate(cfg, inflight, &path, source).await;
    }
}

/// Claim and process one candidate path from either trigger source.
async fn handle_candidate(cfg: &Config, inflight: &mut InFlight, path: &Path, source: &str) {
    // ---
    if !pipeline::eligible(path) {
        return;
    }
    if !inflight.claim(path) {
        debug!(
            "File '{}' is already in flight. Skipping {} trigger.",
            path.display(),
            source
        );
        return;
    }

    info!("{}: Found file {}. Processing.", source, path.display());

    // Settle delay so a writer still flushing the file is not raced.
    tokio::time::sleep(cfg.settle_delay).await;

    if !path.exists() {
        warn!("File {} disappeared before processing.", path.display());
        inflight.release(path);
        return;
    }

    // A file that vanished mid-pipeline releases its claim too, so a
    // same-named arrival later is not blocked until the claim ages out.
    if pipeline::process_file(cfg, path).await == Disposition::Vanished {
        inflight.release(path);
    }
}

fn build_watcher(tx: mpsc::UnboundedSender<PathBuf>) -> Result<RecommendedWatcher> {
    // ---
    let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if is_arrival(&event.kind) {
                for path in event.paths {
                    if tx.send(path).is_err() {
                        debug!("Watch event dropped because the worker loop is gone.");
                    }
                }
            }
        }
        Err(e) => warn!("Watch backend emitted error: {}", e),
    })?;
    Ok(watcher)
}

/// Creation and rename-into events signal a new file in the directory;
/// content-modify events do not (the settle delay absorbs in-place writes).
fn is_arrival(kind: &EventKind) -> bool {
    // ---
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Name(
                RenameMode::To | RenameMode::Both | RenameMode::Any
            ))
    )
}
