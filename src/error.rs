//! Error types for the statistics engine.
//!
//! All errors are strongly typed using thiserror. Lookup failures are
//! ordinary values: the engine returns them, the result cache stores them,
//! and the transport boundary pattern-matches the [`ErrorKind`] to pick a
//! status code.

use std::fmt;

use serde_json::json;
use thiserror::Error;

use crate::storage::LoadError;

/// Message used when a country lookup on a totals or history route fails,
/// and when a region lookup fails.
pub const REGION_NOT_FOUND_MESSAGE: &str = "This region cannot be found. Please try again.";

/// Message used when the country of an all-regions lookup fails.
pub const COUNTRY_NOT_FOUND_MESSAGE: &str = "This country cannot be found. Please try again.";

/// Tag identifying which failure an outcome carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No entity matched the country query.
    CountryNotFound,
    /// The country matched but none of its regions did.
    RegionNotFound,
    /// A stored value could not be interpreted, or a snapshot failed to load.
    DataFormatError,
    /// Anything not anticipated.
    UnexpectedError,
}

impl ErrorKind {
    /// Name used in error bodies (`"<kind> : <message>"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CountryNotFound => "CountryNotFound",
            Self::RegionNotFound => "RegionNotFound",
            Self::DataFormatError => "DataFormatError",
            Self::UnexpectedError => "UnexpectedError",
        }
    }

    /// Transport-level status equivalent: 404 for not-found kinds, 500 otherwise.
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::CountryNotFound | Self::RegionNotFound => 404,
            Self::DataFormatError | Self::UnexpectedError => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine error.
///
/// `Clone` so that failed lookups can be cached and re-served like any
/// other outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No entity matched the country query.
    #[error("{message}")]
    CountryNotFound {
        /// The query as given.
        query: String,
        /// Client-facing message.
        message: String,
    },

    /// The country resolved but has no region of that name.
    #[error("{message}")]
    RegionNotFound {
        /// Country query as given.
        country: String,
        /// Region query as given.
        region: String,
        /// Client-facing message.
        message: String,
    },

    /// Snapshot missing, unreadable or holding values of the wrong shape.
    #[error("{message}")]
    DataFormat {
        /// What could not be interpreted.
        message: String,
    },

    /// Anything else.
    #[error("{message}")]
    Unexpected {
        /// Description.
        message: String,
    },
}

impl EngineError {
    /// Country lookup failure with the given message.
    #[must_use]
    pub fn country_not_found(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CountryNotFound {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Region lookup failure inside a resolved country.
    #[must_use]
    pub fn region_not_found(country: impl Into<String>, region: impl Into<String>) -> Self {
        Self::RegionNotFound {
            country: country.into(),
            region: region.into(),
            message: REGION_NOT_FOUND_MESSAGE.to_string(),
        }
    }

    /// Data format failure.
    #[must_use]
    pub fn data_format(message: impl Into<String>) -> Self {
        Self::DataFormat {
            message: message.into(),
        }
    }

    /// Catch-all failure.
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Returns the kind tag of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::CountryNotFound { .. } => ErrorKind::CountryNotFound,
            Self::RegionNotFound { .. } => ErrorKind::RegionNotFound,
            Self::DataFormat { .. } => ErrorKind::DataFormatError,
            Self::Unexpected { .. } => ErrorKind::UnexpectedError,
        }
    }

    /// Human-readable message, without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::CountryNotFound { message, .. }
            | Self::RegionNotFound { message, .. }
            | Self::DataFormat { message }
            | Self::Unexpected { message } => message,
        }
    }

    /// Transport-level status equivalent.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.kind().status()
    }

    /// Returns true for the expected, 404-style kinds.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CountryNotFound { .. } | Self::RegionNotFound { .. }
        )
    }

    /// JSON error body: `{"error": "<ErrorKind> : <message>"}`.
    #[must_use]
    pub fn to_body(&self) -> serde_json::Value {
        json!({ "error": format!("{} : {}", self.kind(), self.message()) })
    }
}

impl From<LoadError> for EngineError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Poisoned(context) => {
                Self::unexpected(format!("poisoned lock: {context}"))
            }
            other => Self::data_format(other.to_string()),
        }
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
