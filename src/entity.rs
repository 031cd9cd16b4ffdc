//! Entity types: countries and their regions.
//!
//! An [`Entity`] is the unit the resolver hands back. It keeps the stored
//! JSON record untouched so that responses can be returned verbatim, and
//! exposes typed accessors for the handful of fields the engine reads.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Field holding the display name in flat (array-shaped) snapshots.
pub const NAME_FIELD: &str = "country";
/// ISO-3166-1 alpha-2 code field.
pub const ISO2_FIELD: &str = "iso2";
/// ISO-3166-1 alpha-3 code field.
pub const ISO3_FIELD: &str = "iso3";
/// Date → cumulative count field.
pub const HISTORY_FIELD: &str = "history";
/// Region name → nested record field.
pub const REGIONS_FIELD: &str = "regions";

/// The statistic a history snapshot tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Confirmed cases.
    Confirmed,
    /// Recovered cases.
    Recovered,
    /// Deaths.
    Deaths,
}

impl DataType {
    /// Every accepted data type, in documentation order.
    pub const ALL: [Self; 3] = [Self::Confirmed, Self::Recovered, Self::Deaths];

    /// Lower-case name, as used in routes and file names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Recovered => "recovered",
            Self::Deaths => "deaths",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "confirmed" => Ok(Self::Confirmed),
            "recovered" => Ok(Self::Recovered),
            "deaths" => Ok(Self::Deaths),
            other => Err(format!(
                "unknown data type: {other}. Use one of confirmed, recovered, deaths"
            )),
        }
    }
}

/// A country or region as stored in a snapshot.
///
/// # Examples
///
/// ```
/// use covid19_api::Entity;
/// use serde_json::json;
///
/// let record = json!({"iso2": "FR", "iso3": "FRA", "history": {"2021-01-01": 5}});
/// let entity = Entity::new("France", record.as_object().unwrap().clone());
/// assert_eq!(entity.iso2(), "FR");
/// assert_eq!(entity.history().map(|h| h.len()), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    name: String,
    record: Map<String, Value>,
}

impl Entity {
    /// Wraps a stored record under the given display name.
    #[must_use]
    pub fn new(name: impl Into<String>, record: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            record,
        }
    }

    /// Display name: the `country` field of flat snapshots, the key of keyed ones.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// ISO-2 code, empty when absent or not a string.
    #[must_use]
    pub fn iso2(&self) -> &str {
        self.str_field(ISO2_FIELD)
    }

    /// ISO-3 code, empty when absent or not a string.
    #[must_use]
    pub fn iso3(&self) -> &str {
        self.str_field(ISO3_FIELD)
    }

    /// Raw history mapping. Counts are left as stored (numbers or numeric strings).
    #[must_use]
    pub fn history(&self) -> Option<&Map<String, Value>> {
        self.record.get(HISTORY_FIELD).and_then(Value::as_object)
    }

    /// Raw regions mapping, present only for federated countries.
    #[must_use]
    pub fn regions(&self) -> Option<&Map<String, Value>> {
        self.record.get(REGIONS_FIELD).and_then(Value::as_object)
    }

    /// Iterates regions as entities, in stored order.
    pub fn region_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.regions()
            .into_iter()
            .flat_map(|regions| regions.iter())
            .filter_map(|(name, value)| {
                value
                    .as_object()
                    .map(|record| Entity::new(name.clone(), record.clone()))
            })
    }

    /// The stored record, verbatim.
    #[must_use]
    pub const fn record(&self) -> &Map<String, Value> {
        &self.record
    }

    /// Consumes the entity and returns the stored record.
    #[must_use]
    pub fn into_record(self) -> Map<String, Value> {
        self.record
    }

    fn str_field(&self, field: &str) -> &str {
        self.record
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.record.serialize(serializer)
    }
}
