//! Data-directory snapshot source.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::snapshot::{Snapshot, SnapshotName};
use crate::storage::traits::{LoadError, SnapshotSource};

/// Reads snapshot files from a directory written by the ingestion job.
///
/// Only names that parse as a [`SnapshotName`] are ever turned into paths,
/// so request input can never address a file outside `root`.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    /// Create a source rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The data directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the file backing `name`.
    #[must_use]
    pub fn path_for(&self, name: SnapshotName) -> PathBuf {
        self.root.join(name.file_name())
    }
}

impl SnapshotSource for FileSource {
    fn load(&self, name: SnapshotName) -> Result<Snapshot, LoadError> {
        let path = self.path_for(name);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound {
                name: name.to_string(),
                path: path.clone(),
            },
            _ => LoadError::Io {
                name: name.to_string(),
                message: e.to_string(),
            },
        })?;

        let snapshot = Snapshot::from_slice(name, &bytes)?;
        debug!(
            snapshot = %name,
            path = %path.display(),
            bytes = bytes.len(),
            entities = snapshot.len(),
            "decoded snapshot file"
        );
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DataType;

    #[test]
    fn test_reads_named_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("csv_deaths.json"),
            r#"{"France": {"iso2": "FR", "iso3": "FRA", "history": {"2021-01-01": "3"}}}"#,
        )
        .unwrap();

        let source = FileSource::new(dir.path());
        let snap = source.load(SnapshotName::History(DataType::Deaths)).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.entities()[0].iso3(), "FRA");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path());
        let err = source.load(SnapshotName::Current).unwrap_err();
        let LoadError::NotFound { name, path } = err else {
            panic!("expected NotFound, got {err:?}");
        };
        assert_eq!(name, "all");
        assert_eq!(path, dir.path().join("data.json"));
    }

    #[test]
    fn test_garbage_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data.json"), "{ truncated").unwrap();
        let source = FileSource::new(dir.path());
        let err = source.load(SnapshotName::Current).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }
}
