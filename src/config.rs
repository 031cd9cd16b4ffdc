//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::cache::{DEFAULT_SHARDS, DEFAULT_TTL};

/// Default interval between snapshot refreshes.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A numeric setting that must be positive was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Name of the setting.
        field: &'static str,
    },

    /// The data directory is missing or is not a directory.
    #[error("data directory {} does not exist or is not a directory", path.display())]
    MissingDataDir {
        /// Configured path.
        path: PathBuf,
    },
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory holding the snapshot files.
    pub data_dir: PathBuf,
    /// How long a computed outcome is served from the cache.
    pub cache_ttl: Duration,
    /// Maximum cached outcomes; `None` keeps everything until it expires.
    pub cache_capacity: Option<usize>,
    /// Number of independently locked cache shards.
    pub cache_shards: usize,
    /// Interval between snapshot refreshes.
    pub reload_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            cache_ttl: DEFAULT_TTL,
            cache_capacity: None,
            cache_shards: DEFAULT_SHARDS,
            reload_interval: DEFAULT_RELOAD_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// Defaults with the given data directory.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Set the cache TTL.
    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Bound the cache.
    #[must_use]
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Set the shard count.
    #[must_use]
    pub fn cache_shards(mut self, shards: usize) -> Self {
        self.cache_shards = shards;
        self
    }

    /// Set the refresh interval.
    #[must_use]
    pub fn reload_interval(mut self, interval: Duration) -> Self {
        self.reload_interval = interval;
        self
    }

    /// Check the configuration, including that the data directory exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::Zero { field: "cache_ttl" });
        }
        if self.cache_capacity == Some(0) {
            return Err(ConfigError::Zero {
                field: "cache_capacity",
            });
        }
        if self.cache_shards == 0 {
            return Err(ConfigError::Zero {
                field: "cache_shards",
            });
        }
        if self.reload_interval.is_zero() {
            return Err(ConfigError::Zero {
                field: "reload_interval",
            });
        }
        if !self.data_dir.is_dir() {
            return Err(ConfigError::MissingDataDir {
                path: self.data_dir.clone(),
            });
        }
        Ok(())
    }
}
