//! Background snapshot refresh.
//!
//! The ingestion job rewrites snapshot files out of band; the reloader
//! polls them on a fixed interval so new content is picked up without a
//! restart, and sweeps the result cache on every tick.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::engine::StatsEngine;

/// Handle to the refresh thread. Dropping it stops the thread without waiting.
pub struct SnapshotReloader {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl SnapshotReloader {
    /// Start refreshing `engine` every `interval`.
    pub fn spawn(engine: Arc<StatsEngine>, interval: Duration) -> io::Result<Self> {
        let (stop, stopped) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("covid19-reloader".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => tick(&engine),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        info!(
            interval_ms = interval.as_millis().min(u128::from(u64::MAX)) as u64,
            "snapshot reloader started"
        );
        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
            interval,
        })
    }

    /// Configured interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the thread and wait for an in-flight refresh to finish.
    pub fn shutdown(mut self) {
        self.signal();
        if let Some(handle) = self.handle.take() {
            join_worker(handle);
        }
        info!("snapshot reloader stopped");
    }

    fn signal(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
    }
}

impl Drop for SnapshotReloader {
    fn drop(&mut self) {
        self.signal();
    }
}

impl std::fmt::Debug for SnapshotReloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotReloader")
            .field("interval", &self.interval)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

/// Returns false if the thread panicked.
fn join_worker(handle: JoinHandle<()>) -> bool {
    match handle.join() {
        Ok(()) => true,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(%reason, "snapshot reloader thread panicked");
            false
        }
    }
}

fn tick(engine: &StatsEngine) {
    match engine.refresh() {
        Ok(report) => debug!(
            reloaded = report.reloaded.len(),
            unchanged = report.unchanged,
            failed = report.failed.len(),
            cached = engine.cache().len(),
            "refresh tick"
        ),
        Err(err) => warn!(error = %err, "snapshot refresh failed"),
    }
}
