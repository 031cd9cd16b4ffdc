//! Immutable dataset snapshots.
//!
//! A [`Snapshot`] is one decoded JSON file: the current totals, the
//! per-country history of one data type, or one of the two regional
//! history variants. Snapshots are never mutated after decoding; a newer
//! file produces a new `Snapshot` that replaces the old one wholesale.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::entity::{DataType, Entity, NAME_FIELD, REGIONS_FIELD};
use crate::storage::LoadError;

/// Logical snapshot name.
///
/// Displays as `all`, `history:<type>`, `history:<type>:region` or
/// `history:<type>:region:us`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotName {
    /// Whole-world current totals (`data.json`).
    Current,
    /// Per-country history (`csv_<type>.json`).
    History(DataType),
    /// Per-country history with regions (`csv_<type>_region.json`).
    Regions(DataType),
    /// US per-state history (`csv_<type>_us_region.json`).
    UsRegions(DataType),
}

impl SnapshotName {
    /// File name the ingestion job writes this snapshot to.
    #[must_use]
    pub fn file_name(self) -> String {
        match self {
            Self::Current => "data.json".to_string(),
            Self::History(dt) => format!("csv_{dt}.json"),
            Self::Regions(dt) => format!("csv_{dt}_region.json"),
            Self::UsRegions(dt) => format!("csv_{dt}_us_region.json"),
        }
    }

    /// Every snapshot the engine can ask for.
    #[must_use]
    pub fn all() -> Vec<Self> {
        let mut names = vec![Self::Current];
        for dt in DataType::ALL {
            names.extend([Self::History(dt), Self::Regions(dt), Self::UsRegions(dt)]);
        }
        names
    }
}

impl fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => write!(f, "all"),
            Self::History(dt) => write!(f, "history:{dt}"),
            Self::Regions(dt) => write!(f, "history:{dt}:region"),
            Self::UsRegions(dt) => write!(f, "history:{dt}:region:us"),
        }
    }
}

impl FromStr for SnapshotName {
    type Err = LoadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let unknown = || LoadError::UnknownSnapshot(value.to_string());
        if value == "all" {
            return Ok(Self::Current);
        }

        let mut parts = value.split(':');
        if parts.next() != Some("history") {
            return Err(unknown());
        }
        let dt: DataType = parts.next().ok_or_else(unknown)?.parse().map_err(|_| unknown())?;
        match (parts.next(), parts.next(), parts.next()) {
            (None, None, None) => Ok(Self::History(dt)),
            (Some("region"), None, None) => Ok(Self::Regions(dt)),
            (Some("region"), Some("us"), None) => Ok(Self::UsRegions(dt)),
            _ => Err(unknown()),
        }
    }
}

/// Storage shape of the source JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotShape {
    /// JSON array of records; names come from the `country` field.
    Flat,
    /// JSON object; names are the keys.
    Keyed,
}

/// A decoded, immutable snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    name: SnapshotName,
    shape: SnapshotShape,
    entities: Vec<Entity>,
    loaded_at: DateTime<Utc>,
    digest: blake3::Hash,
}

impl Snapshot {
    /// Decodes a snapshot from raw file bytes.
    ///
    /// The digest covers the raw bytes, so re-reading an unchanged file
    /// yields an equal digest.
    pub fn from_slice(name: SnapshotName, bytes: &[u8]) -> Result<Self, LoadError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| LoadError::Malformed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Self::decode(name, value, blake3::hash(bytes))
    }

    /// Decodes a snapshot from an already-parsed JSON value.
    pub fn from_value(name: SnapshotName, value: Value) -> Result<Self, LoadError> {
        let bytes = serde_json::to_vec(&value).map_err(|e| LoadError::Malformed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Self::decode(name, value, blake3::hash(&bytes))
    }

    fn decode(name: SnapshotName, value: Value, digest: blake3::Hash) -> Result<Self, LoadError> {
        let malformed = |reason: String| LoadError::Malformed {
            name: name.to_string(),
            reason,
        };

        let (shape, entities) = match value {
            Value::Array(items) => {
                let mut entities = Vec::with_capacity(items.len());
                for (idx, item) in items.into_iter().enumerate() {
                    let Value::Object(record) = item else {
                        return Err(malformed(format!("entry {idx} is not an object")));
                    };
                    let Some(entity_name) = record.get(NAME_FIELD).and_then(Value::as_str) else {
                        return Err(malformed(format!("entry {idx} has no '{NAME_FIELD}' string")));
                    };
                    let entity_name = entity_name.to_string();
                    check_regions(&entity_name, &record).map_err(malformed)?;
                    entities.push(Entity::new(entity_name, record));
                }
                (SnapshotShape::Flat, entities)
            }
            Value::Object(map) => {
                let mut entities = Vec::with_capacity(map.len());
                for (key, item) in map {
                    let Value::Object(record) = item else {
                        return Err(malformed(format!("entry '{key}' is not an object")));
                    };
                    check_regions(&key, &record).map_err(malformed)?;
                    entities.push(Entity::new(key, record));
                }
                (SnapshotShape::Keyed, entities)
            }
            other => {
                return Err(malformed(format!(
                    "expected an array or an object at the top level, found {}",
                    json_type(&other)
                )));
            }
        };

        Ok(Self {
            name,
            shape,
            entities,
            loaded_at: Utc::now(),
            digest,
        })
    }

    /// Logical name.
    #[must_use]
    pub const fn name(&self) -> SnapshotName {
        self.name
    }

    /// Source shape.
    #[must_use]
    pub const fn shape(&self) -> SnapshotShape {
        self.shape
    }

    /// Entities in stored order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the snapshot holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// When this snapshot was decoded.
    #[must_use]
    pub const fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Content digest of the source.
    #[must_use]
    pub const fn digest(&self) -> &blake3::Hash {
        &self.digest
    }

    /// Re-encodes the snapshot in its source shape, field order preserved.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self.shape {
            SnapshotShape::Flat => Value::Array(
                self.entities
                    .iter()
                    .map(|e| Value::Object(e.record().clone()))
                    .collect(),
            ),
            SnapshotShape::Keyed => Value::Object(
                self.entities
                    .iter()
                    .map(|e| (e.name().to_string(), Value::Object(e.record().clone())))
                    .collect(),
            ),
        }
    }
}

fn check_regions(entity: &str, record: &Map<String, Value>) -> Result<(), String> {
    match record.get(REGIONS_FIELD) {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Object(regions)) => {
            for (region, value) in regions {
                if !value.is_object() {
                    return Err(format!("region '{region}' of '{entity}' is not an object"));
                }
            }
            Ok(())
        }
        Some(other) => Err(format!(
            "'{REGIONS_FIELD}' of '{entity}' must be an object, found {}",
            json_type(other)
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_names_display_and_parse() {
        for name in SnapshotName::all() {
            let parsed: SnapshotName = name.to_string().parse().unwrap();
            assert_eq!(parsed, name);
        }
        assert_eq!(
            SnapshotName::UsRegions(DataType::Deaths).to_string(),
            "history:deaths:region:us"
        );
        assert_eq!(SnapshotName::all().len(), 10);
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        for bad in ["", "history", "history:active", "history:deaths:us", "all:x", "history:deaths:region:us:x"] {
            let err = bad.parse::<SnapshotName>().unwrap_err();
            assert!(matches!(err, LoadError::UnknownSnapshot(_)), "{bad}");
        }
    }

    #[test]
    fn test_file_names() {
        assert_eq!(SnapshotName::Current.file_name(), "data.json");
        assert_eq!(SnapshotName::History(DataType::Confirmed).file_name(), "csv_confirmed.json");
        assert_eq!(SnapshotName::Regions(DataType::Recovered).file_name(), "csv_recovered_region.json");
        assert_eq!(SnapshotName::UsRegions(DataType::Deaths).file_name(), "csv_deaths_us_region.json");
    }

    #[test]
    fn test_flat_snapshot_uses_country_field() {
        let value = json!([
            {"country": "France", "iso2": "FR", "iso3": "FRA", "confirmed": 1},
            {"country": "Spain", "iso2": "ES", "iso3": "ESP", "confirmed": 2}
        ]);
        let snap = Snapshot::from_value(SnapshotName::Current, value.clone()).unwrap();
        assert_eq!(snap.shape(), SnapshotShape::Flat);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.entities()[1].name(), "Spain");
        assert_eq!(snap.to_json(), value);
    }

    #[test]
    fn test_keyed_snapshot_preserves_insertion_order() {
        let raw = br#"{"Zimbabwe": {"iso2": "ZW", "iso3": "ZWE", "history": {}},
                      "Albania": {"iso2": "AL", "iso3": "ALB", "history": {}}}"#;
        let snap = Snapshot::from_slice(SnapshotName::History(DataType::Confirmed), raw).unwrap();
        assert_eq!(snap.shape(), SnapshotShape::Keyed);
        let names: Vec<&str> = snap.entities().iter().map(Entity::name).collect();
        assert_eq!(names, vec!["Zimbabwe", "Albania"]);
        let keys: Vec<String> = snap.to_json().as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["Zimbabwe", "Albania"]);
    }

    #[test]
    fn test_digest_tracks_bytes() {
        let name = SnapshotName::Current;
        let a = Snapshot::from_slice(name, br#"[{"country": "A"}]"#).unwrap();
        let b = Snapshot::from_slice(name, br#"[{"country": "A"}]"#).unwrap();
        let c = Snapshot::from_slice(name, br#"[{"country": "B"}]"#).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
    }

    #[test]
    fn test_malformed_inputs() {
        let name = SnapshotName::Current;
        let cases: [&[u8]; 5] = [
            b"not json",
            b"42",
            br#"[{"iso2": "FR"}]"#,
            br#"[1, 2]"#,
            br#"{"France": {"regions": ["Paris"]}}"#,
        ];
        for raw in cases {
            let err = Snapshot::from_slice(name, raw).unwrap_err();
            assert!(matches!(err, LoadError::Malformed { .. }), "{}", String::from_utf8_lossy(raw));
        }
    }

    #[test]
    fn test_null_regions_are_accepted() {
        let raw = br#"{"France": {"iso2": "FR", "regions": null}}"#;
        let snap = Snapshot::from_slice(SnapshotName::Regions(DataType::Deaths), raw).unwrap();
        assert!(snap.entities()[0].regions().is_none());
    }
}
