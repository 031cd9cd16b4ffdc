//! Request execution.
//!
//! [`StatsEngine`] answers the seven read operations against the
//! [`SnapshotStore`], memoizing every outcome (errors included) in a
//! [`ResultCache`] keyed by operation name and arguments. The engine never
//! picks an HTTP status; [`EngineResponse`] is the boundary that does.

mod reloader;

pub use reloader::SnapshotReloader;

use std::sync::Arc;

use serde_json::Value;
use tracing::error;

use crate::aggregate::aggregate_world;
use crate::cache::{CacheKey, ResultCache};
use crate::config::EngineConfig;
use crate::entity::DataType;
use crate::error::{EngineError, EngineResult};
use crate::resolver::{resolve_country, resolve_region, resolve_regions, RegionScope};
use crate::snapshot::SnapshotName;
use crate::storage::{FileSource, LoadError, RefreshReport, SnapshotSource, SnapshotStore};

/// Cached result of one request: the response document or a typed error.
pub type Outcome = Result<Arc<Value>, EngineError>;

/// A history lookup as it arrives from a client.
///
/// `data_type` stays a raw string until execution so that an unknown value
/// surfaces as an outcome rather than a parse failure at the edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    /// `confirmed`, `recovered` or `deaths`.
    pub data_type: String,
    /// Country identifier (name, ISO2 or ISO3).
    pub country: Option<String>,
    /// Region name; only meaningful together with `country`.
    pub region: Option<String>,
}

impl Query {
    /// History of every country for `data_type`.
    #[must_use]
    pub fn new(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            country: None,
            region: None,
        }
    }

    /// Narrow to one country.
    #[must_use]
    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Narrow to one region of the country.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// One engine operation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Request {
    /// Current totals of every country.
    All,
    /// Current totals of one country.
    AllCountry {
        /// Country identifier.
        country: String,
    },
    /// History of every country.
    History {
        /// Raw data type.
        data_type: String,
    },
    /// World history summed over countries.
    HistoryTotal {
        /// Raw data type.
        data_type: String,
    },
    /// History of one country.
    HistoryCountry {
        /// Raw data type.
        data_type: String,
        /// Country identifier.
        country: String,
    },
    /// Every region of one country.
    HistoryRegions {
        /// Raw data type.
        data_type: String,
        /// Country identifier.
        country: String,
    },
    /// One region of one country.
    HistoryRegion {
        /// Raw data type.
        data_type: String,
        /// Country identifier.
        country: String,
        /// Region name.
        region: String,
    },
}

impl Request {
    /// Operation name used in cache keys and logs.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::AllCountry { .. } => "all_country",
            Self::History { .. } => "history",
            Self::HistoryTotal { .. } => "history_total",
            Self::HistoryCountry { .. } => "history_country",
            Self::HistoryRegions { .. } => "history_regions",
            Self::HistoryRegion { .. } => "history_region",
        }
    }

    /// Positional arguments as given.
    #[must_use]
    pub fn args(&self) -> Vec<&str> {
        match self {
            Self::All => Vec::new(),
            Self::AllCountry { country } => vec![country.as_str()],
            Self::History { data_type } | Self::HistoryTotal { data_type } => vec![data_type.as_str()],
            Self::HistoryCountry { data_type, country } | Self::HistoryRegions { data_type, country } => {
                vec![data_type.as_str(), country.as_str()]
            }
            Self::HistoryRegion {
                data_type,
                country,
                region,
            } => vec![data_type.as_str(), country.as_str(), region.as_str()],
        }
    }

    /// Deterministic cache key.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.operation(), self.args())
    }
}

impl From<Query> for Request {
    fn from(query: Query) -> Self {
        let Query {
            data_type,
            country,
            region,
        } = query;
        match (country, region) {
            (Some(country), Some(region)) => Self::HistoryRegion {
                data_type,
                country,
                region,
            },
            (Some(country), None) => Self::HistoryCountry { data_type, country },
            (None, _) => Self::History { data_type },
        }
    }
}

/// Status and body for the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResponse {
    /// HTTP-style status code.
    pub status: u16,
    /// JSON body.
    pub body: Arc<Value>,
}

impl EngineResponse {
    /// Maps an outcome to a response, logging server-side failures.
    #[must_use]
    pub fn from_outcome(request: &Request, outcome: Outcome) -> Self {
        match outcome {
            Ok(body) => Self { status: 200, body },
            Err(err) => {
                if !err.is_not_found() {
                    error!(
                        operation = request.operation(),
                        kind = %err.kind(),
                        message = err.message(),
                        "request failed"
                    );
                }
                Self {
                    status: err.status(),
                    body: Arc::new(err.to_body()),
                }
            }
        }
    }

    /// Returns true for a 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Read-only query engine over the snapshot store.
#[derive(Debug, Clone)]
pub struct StatsEngine {
    store: Arc<SnapshotStore>,
    cache: Arc<ResultCache<Outcome>>,
}

impl StatsEngine {
    /// Engine over an existing store and cache.
    #[must_use]
    pub fn new(store: Arc<SnapshotStore>, cache: Arc<ResultCache<Outcome>>) -> Self {
        Self { store, cache }
    }

    /// Engine over any source with a default cache.
    #[must_use]
    pub fn with_source(source: Arc<dyn SnapshotSource>) -> Self {
        let config = EngineConfig::default();
        Self::new(
            Arc::new(SnapshotStore::new(source)),
            Arc::new(ResultCache::new(config.cache_ttl).with_shards(config.cache_shards)),
        )
    }

    /// Engine reading snapshot files from `config.data_dir`.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        let source: Arc<dyn SnapshotSource> = Arc::new(FileSource::new(&config.data_dir));
        let mut cache = ResultCache::new(config.cache_ttl).with_shards(config.cache_shards);
        if let Some(capacity) = config.cache_capacity {
            cache = cache.with_capacity(capacity);
        }
        Self::new(Arc::new(SnapshotStore::new(source)), Arc::new(cache))
    }

    /// The snapshot store.
    #[must_use]
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// The result cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ResultCache<Outcome>> {
        &self.cache
    }

    /// Execute a request, serving it from the cache when possible.
    pub fn execute(&self, request: &Request) -> Outcome {
        // Read before computing: a swap during compute then invalidates the entry.
        let generation = self.store.generation();
        self.cache
            .get_or_compute(request.cache_key(), generation, || self.compute(request).map(Arc::new))
    }

    /// Execute and map the outcome for the transport layer.
    #[must_use]
    pub fn handle(&self, request: &Request) -> EngineResponse {
        EngineResponse::from_outcome(request, self.execute(request))
    }

    /// Current totals of every country.
    pub fn all(&self) -> Outcome {
        self.execute(&Request::All)
    }

    /// Current totals of one country.
    pub fn all_country(&self, country: &str) -> Outcome {
        self.execute(&Request::AllCountry {
            country: country.to_string(),
        })
    }

    /// History of every country.
    pub fn history(&self, data_type: &str) -> Outcome {
        self.execute(&Request::History {
            data_type: data_type.to_string(),
        })
    }

    /// World history summed over every country.
    pub fn history_total(&self, data_type: &str) -> Outcome {
        self.execute(&Request::HistoryTotal {
            data_type: data_type.to_string(),
        })
    }

    /// History of one country.
    pub fn history_country(&self, data_type: &str, country: &str) -> Outcome {
        self.execute(&Request::HistoryCountry {
            data_type: data_type.to_string(),
            country: country.to_string(),
        })
    }

    /// Every region of one country.
    pub fn history_regions(&self, data_type: &str, country: &str) -> Outcome {
        self.execute(&Request::HistoryRegions {
            data_type: data_type.to_string(),
            country: country.to_string(),
        })
    }

    /// One region of one country.
    pub fn history_region(&self, data_type: &str, country: &str, region: &str) -> Outcome {
        self.execute(&Request::HistoryRegion {
            data_type: data_type.to_string(),
            country: country.to_string(),
            region: region.to_string(),
        })
    }

    /// Execute a client query.
    pub fn query(&self, query: Query) -> Outcome {
        self.execute(&Request::from(query))
    }

    /// Re-read loaded snapshots and drop cache entries that can no longer be served.
    pub fn refresh(&self) -> EngineResult<RefreshReport> {
        let report = self.store.refresh()?;
        self.cache.purge_expired(self.store.generation());
        Ok(report)
    }

    fn compute(&self, request: &Request) -> EngineResult<Value> {
        match request {
            Request::All => Ok(self.store.get(SnapshotName::Current)?.to_json()),
            Request::AllCountry { country } => {
                let snapshot = self.store.get(SnapshotName::Current)?;
                let entity = resolve_country(&snapshot, country)?;
                Ok(Value::Object(entity.record().clone()))
            }
            Request::History { data_type } => {
                let snapshot = self.store.get(SnapshotName::History(parse_data_type(data_type)?))?;
                Ok(snapshot.to_json())
            }
            Request::HistoryTotal { data_type } => {
                let snapshot = self.store.get(SnapshotName::History(parse_data_type(data_type)?))?;
                Ok(aggregate_world(&snapshot)?.into_json())
            }
            Request::HistoryCountry { data_type, country } => {
                let snapshot = self.store.get(SnapshotName::History(parse_data_type(data_type)?))?;
                let entity = resolve_country(&snapshot, country)?;
                Ok(Value::Object(entity.record().clone()))
            }
            Request::HistoryRegions { data_type, country } => {
                let snapshot = self.store.get(region_snapshot(data_type, country)?)?;
                Ok(resolve_regions(&snapshot, country)?.to_json())
            }
            Request::HistoryRegion {
                data_type,
                country,
                region,
            } => {
                let snapshot = self.store.get(region_snapshot(data_type, country)?)?;
                Ok(Value::Object(resolve_region(&snapshot, country, region)?.into_record()))
            }
        }
    }
}

fn parse_data_type(raw: &str) -> EngineResult<DataType> {
    raw.parse::<DataType>()
        .map_err(|_| EngineError::from(LoadError::UnknownSnapshot(format!("history:{raw}"))))
}

fn region_snapshot(data_type: &str, country: &str) -> EngineResult<SnapshotName> {
    let data_type = parse_data_type(data_type)?;
    Ok(match RegionScope::for_country(country) {
        RegionScope::UnitedStates => SnapshotName::UsRegions(data_type),
        RegionScope::Global => SnapshotName::Regions(data_type),
    })
}
