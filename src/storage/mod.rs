//! Snapshot storage.
//!
//! [`SnapshotSource`] is the boundary with the external ingestion job;
//! [`SnapshotStore`] holds the current decoded snapshots and swaps them
//! atomically when the source changes.

mod file;
mod memory;
mod store;
mod traits;

pub use file::FileSource;
pub use memory::InMemorySource;
pub use store::{RefreshReport, SnapshotStore};
pub use traits::{LoadError, SnapshotSource};
