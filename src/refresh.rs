//! Background refresh loop
//!
//! Rebuilds the snapshot on a fixed interval and swaps it into the registry.
//! A failed or cancelled run leaves the previous snapshot in place. The first
//! successful run marks the registry ready.

use crate::ingest::{Ingest, IngestError};
use crate::registry::{Registry, Shutdown};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome of one refresh attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refreshed {
    /// New snapshot swapped in, with its generation
    Swapped(u64),
    /// Ingestion failed; the old snapshot stays
    Failed,
    /// Shutdown fired during ingestion
    Cancelled,
}

/// Run one ingestion and swap the result in on success.
pub fn refresh_once(registry: &Registry, ingest: &dyn Ingest, shutdown: &Shutdown) -> Refreshed {
    let started = Instant::now();
    match ingest.ingest(shutdown) {
        Ok(repos) => {
            let count = repos.len();
            let generation = registry.replace(repos);
            registry.mark_ready();
            info!(
                source = %ingest.describe(),
                repos = count,
                generation,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "snapshot refreshed"
            );
            Refreshed::Swapped(generation)
        }
        Err(IngestError::Cancelled) => {
            info!(source = %ingest.describe(), "refresh cancelled");
            Refreshed::Cancelled
        }
        Err(e) => {
            warn!(source = %ingest.describe(), error = %e, "sync error");
            Refreshed::Failed
        }
    }
}

/// Spawn the refresh loop. An unready registry is bootstrapped right away;
/// after that the loop waits `interval` between runs. It exits as soon as
/// `shutdown` fires.
pub fn spawn(
    registry: Arc<Registry>,
    ingest: Arc<dyn Ingest>,
    interval: Duration,
    shutdown: Arc<Shutdown>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("backboard-refresh".to_string())
        .spawn(move || {
            let mut wait = if registry.is_ready() {
                interval
            } else {
                Duration::ZERO
            };
            while !shutdown.wait_timeout(wait) {
                if refresh_once(&registry, ingest.as_ref(), &shutdown) == Refreshed::Cancelled {
                    break;
                }
                wait = interval;
            }
            info!("refresh loop stopped");
        })
}
