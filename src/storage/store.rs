//! The snapshot store: current snapshots, swapped atomically.
//!
//! Readers take the read lock only long enough to clone an `Arc`; the
//! snapshot itself is immutable, so a request keeps a consistent view even
//! if a newer snapshot is swapped in while it runs. Writers build the new
//! snapshot outside the lock and replace the `Arc` in one step.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::snapshot::{Snapshot, SnapshotName};
use crate::storage::traits::{LoadError, SnapshotSource};

/// Outcome of [`SnapshotStore::refresh`].
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Snapshots whose content changed and were swapped in.
    pub reloaded: Vec<SnapshotName>,
    /// Snapshots re-read with an identical digest.
    pub unchanged: usize,
    /// Snapshots that failed to reload; the previous version stays current.
    pub failed: Vec<(SnapshotName, LoadError)>,
}

impl RefreshReport {
    /// Returns true if at least one snapshot was swapped.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.reloaded.is_empty()
    }
}

/// Shared, read-mostly holder of the current snapshots.
pub struct SnapshotStore {
    source: Arc<dyn SnapshotSource>,
    snapshots: RwLock<HashMap<SnapshotName, Arc<Snapshot>>>,
    generation: AtomicU64,
}

impl SnapshotStore {
    /// Create an empty store backed by `source`. Snapshots load on first use.
    #[must_use]
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            source,
            snapshots: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Incremented whenever a loaded snapshot is replaced by different content.
    ///
    /// Results derived from generation `g` are stale once this moves past `g`.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Load a snapshot by its logical name (`all`, `history:<type>`, ...).
    pub fn load(&self, name: &str) -> Result<Arc<Snapshot>, LoadError> {
        self.get(name.parse()?)
    }

    /// Current version of `name`, loading it from the source on first use.
    pub fn get(&self, name: SnapshotName) -> Result<Arc<Snapshot>, LoadError> {
        {
            let guard = self
                .snapshots
                .read()
                .map_err(|_| LoadError::Poisoned("snapshots.get"))?;
            if let Some(snapshot) = guard.get(&name) {
                return Ok(Arc::clone(snapshot));
            }
        }

        let loaded = Arc::new(self.source.load(name)?);

        let mut guard = self
            .snapshots
            .write()
            .map_err(|_| LoadError::Poisoned("snapshots.get"))?;

        // Another thread may have loaded it while we were reading.
        let current = guard.entry(name).or_insert_with(|| {
            info!(
                snapshot = %name,
                entities = loaded.len(),
                source = %self.source.describe(),
                "snapshot loaded"
            );
            Arc::clone(&loaded)
        });
        Ok(Arc::clone(current))
    }

    /// Swap in a snapshot produced elsewhere. Returns the replaced version.
    pub fn replace(&self, snapshot: Snapshot) -> Result<Option<Arc<Snapshot>>, LoadError> {
        let name = snapshot.name();
        let previous = self
            .snapshots
            .write()
            .map_err(|_| LoadError::Poisoned("snapshots.replace"))?
            .insert(name, Arc::new(snapshot));
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        info!(snapshot = %name, generation, "snapshot replaced");
        Ok(previous)
    }

    /// Re-read every loaded snapshot and swap in those whose content changed.
    ///
    /// Snapshots that fail to reload keep serving their previous version.
    pub fn refresh(&self) -> Result<RefreshReport, LoadError> {
        let loaded = self.loaded()?;
        let mut report = RefreshReport::default();

        for (name, current) in loaded {
            match self.source.load(name) {
                Ok(fresh) if fresh.digest() == current.digest() => {
                    report.unchanged += 1;
                }
                Ok(fresh) => {
                    self.snapshots
                        .write()
                        .map_err(|_| LoadError::Poisoned("snapshots.refresh"))?
                        .insert(name, Arc::new(fresh));
                    report.reloaded.push(name);
                }
                Err(err) => {
                    warn!(snapshot = %name, error = %err, "snapshot reload failed, keeping previous version");
                    report.failed.push((name, err));
                }
            }
        }

        if report.changed() {
            let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
            info!(reloaded = ?report.reloaded, generation, "snapshots refreshed");
        } else {
            debug!(unchanged = report.unchanged, failed = report.failed.len(), "snapshots unchanged");
        }
        Ok(report)
    }

    /// Eagerly load `names`, returning the failures.
    pub fn preload(&self, names: &[SnapshotName]) -> Vec<(SnapshotName, LoadError)> {
        names
            .iter()
            .filter_map(|&name| self.get(name).err().map(|err| (name, err)))
            .collect()
    }

    /// Names currently held, with their snapshots.
    fn loaded(&self) -> Result<Vec<(SnapshotName, Arc<Snapshot>)>, LoadError> {
        Ok(self
            .snapshots
            .read()
            .map_err(|_| LoadError::Poisoned("snapshots.loaded"))?
            .iter()
            .map(|(name, snapshot)| (*name, Arc::clone(snapshot)))
            .collect())
    }

    /// Names currently held.
    pub fn loaded_names(&self) -> Result<Vec<SnapshotName>, LoadError> {
        Ok(self.loaded()?.into_iter().map(|(name, _)| name).collect())
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("source", &self.source.describe())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
