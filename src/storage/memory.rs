//! In-memory snapshot source.
//!
//! Holds raw JSON values keyed by snapshot name. Intended for embedded
//! usage and tests, where "the ingestion job" is a call to [`InMemorySource::put`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use serde_json::Value;

use crate::snapshot::{Snapshot, SnapshotName};
use crate::storage::traits::{LoadError, SnapshotSource};

/// Thread-safe in-memory snapshot source.
#[derive(Debug, Default)]
pub struct InMemorySource {
    values: RwLock<HashMap<SnapshotName, Value>>,
    loads: AtomicUsize,
}

impl InMemorySource {
    /// Create a new empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`InMemorySource::put`].
    #[must_use]
    pub fn with(self, name: SnapshotName, value: Value) -> Self {
        // Not shared yet, the lock cannot be poisoned.
        if let Ok(mut values) = self.values.write() {
            values.insert(name, value);
        }
        self
    }

    /// Publish (or replace) the value behind `name`.
    pub fn put(&self, name: SnapshotName, value: Value) -> Result<(), LoadError> {
        self.values
            .write()
            .map_err(|_| LoadError::Poisoned("memory.put"))?
            .insert(name, value);
        Ok(())
    }

    /// Withdraw the value behind `name`.
    pub fn remove(&self, name: SnapshotName) -> Result<Option<Value>, LoadError> {
        Ok(self
            .values
            .write()
            .map_err(|_| LoadError::Poisoned("memory.remove"))?
            .remove(&name))
    }

    /// Number of `load` calls served so far, successful or not.
    #[must_use]
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl SnapshotSource for InMemorySource {
    fn load(&self, name: SnapshotName) -> Result<Snapshot, LoadError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let value = self
            .values
            .read()
            .map_err(|_| LoadError::Poisoned("memory.load"))?
            .get(&name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                name: name.to_string(),
                path: format!("memory:{name}").into(),
            })?;
        Snapshot::from_value(name, value)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_load_remove() {
        let source = InMemorySource::new();
        source
            .put(SnapshotName::Current, json!([{"country": "France", "iso2": "FR", "iso3": "FRA"}]))
            .unwrap();

        let snap = source.load(SnapshotName::Current).unwrap();
        assert_eq!(snap.entities()[0].name(), "France");
        assert_eq!(source.loads(), 1);

        assert!(source.remove(SnapshotName::Current).unwrap().is_some());
        assert!(matches!(
            source.load(SnapshotName::Current),
            Err(LoadError::NotFound { .. })
        ));
        assert_eq!(source.loads(), 2);
    }

    #[test]
    fn test_builder_with() {
        let source = InMemorySource::new().with(SnapshotName::Current, json!([]));
        assert!(source.load(SnapshotName::Current).unwrap().is_empty());
    }
}
