//! Abstract snapshot source.
//!
//! The ingestion job that produces snapshot files is an external
//! collaborator. [`SnapshotSource`] is the seam where the engine meets
//! it: given a logical name, produce a decoded [`Snapshot`] or fail with a
//! [`LoadError`]. Implementations:
//! - [`crate::storage::FileSource`] reads the JSON files from a data directory
//! - [`crate::storage::InMemorySource`] serves values held in memory (tests, embedding)

use std::path::PathBuf;

use thiserror::Error;

use crate::snapshot::{Snapshot, SnapshotName};

/// Errors that can occur while loading a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The underlying resource does not exist.
    #[error("snapshot '{name}' not found at {}", path.display())]
    NotFound {
        /// Logical snapshot name.
        name: String,
        /// Where the source looked.
        path: PathBuf,
    },

    /// The resource exists but could not be read.
    #[error("failed to read snapshot '{name}': {message}")]
    Io {
        /// Logical snapshot name.
        name: String,
        /// Underlying I/O error.
        message: String,
    },

    /// The resource was read but is not a valid snapshot.
    #[error("malformed snapshot '{name}': {reason}")]
    Malformed {
        /// Logical snapshot name.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The requested name does not denote any snapshot.
    #[error("no snapshot named '{0}'")]
    UnknownSnapshot(String),

    /// A lock guarding snapshot state was poisoned.
    #[error("poisoned lock: {0}")]
    Poisoned(&'static str),
}

/// Produces decoded snapshots by logical name.
///
/// # Safety Considerations
/// - `load` is called from request threads and from the background
///   reloader concurrently; implementations must be thread-safe
/// - `load` must never return a partially decoded snapshot
pub trait SnapshotSource: Send + Sync {
    /// Load the current version of the named snapshot.
    fn load(&self, name: SnapshotName) -> Result<Snapshot, LoadError>;

    /// Short description for logs (a directory, "memory", ...).
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_snapshot_source_object_safe(_: &dyn SnapshotSource) {}

    #[test]
    fn test_load_error_display() {
        let err = LoadError::NotFound {
            name: "all".to_string(),
            path: PathBuf::from("/data/data.json"),
        };
        assert_eq!(err.to_string(), "snapshot 'all' not found at /data/data.json");

        let err = LoadError::UnknownSnapshot("history:active".to_string());
        assert!(err.to_string().contains("history:active"));
    }
}
