//! # covid19-api
//!
//! Read-only query engine behind a COVID-19 statistics API. An external
//! ingestion job writes JSON snapshots (current totals, per-country history,
//! per-country regional history); this crate resolves loosely-typed location
//! identifiers against them, aggregates world totals, and memoizes every
//! answer for a bounded time.
//!
//! ## Core Concepts
//!
//! - **Snapshot**: an immutable decoded JSON document, swapped atomically on reload
//! - **Entity**: one country or region record inside a snapshot
//! - **Matcher**: loose identifier matching (exact ISO codes, substring names)
//! - **Result cache**: TTL + generation keyed memoization of outcomes, errors included
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use covid19_api::{InMemorySource, SnapshotName, StatsEngine};
//! use serde_json::json;
//!
//! let source = InMemorySource::new().with(
//!     SnapshotName::Current,
//!     json!([{"country": "France", "iso2": "FR", "iso3": "FRA", "confirmed": 10}]),
//! );
//! let engine = StatsEngine::with_source(Arc::new(source));
//!
//! let france = engine.all_country("fr").unwrap();
//! assert_eq!(france["confirmed"], 10);
//! assert_eq!(engine.all_country("germany").unwrap_err().status(), 404);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Data model
pub mod entity;
pub mod error;
pub mod snapshot;

// Lookup and aggregation
pub mod aggregate;
pub mod matcher;
pub mod resolver;

// Storage, caching and execution
pub mod cache;
pub mod config;
pub mod engine;
pub mod routes;
pub mod storage;

pub use aggregate::{aggregate_world, WorldHistory};
pub use cache::{CacheKey, CacheStats, Clock, ManualClock, ResultCache, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use engine::{EngineResponse, Outcome, Query, Request, SnapshotReloader, StatsEngine};
pub use entity::{DataType, Entity};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use resolver::{resolve_country, resolve_region, resolve_regions, RegionScope, RegionsView};
pub use snapshot::{Snapshot, SnapshotName, SnapshotShape};
pub use storage::{FileSource, InMemorySource, LoadError, RefreshReport, SnapshotSource, SnapshotStore};
