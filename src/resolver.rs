//! Location resolution over snapshots.
//!
//! Countries resolve loosely (see [`crate::matcher::matches`]) and the
//! first match in stored order wins. Regions resolve strictly: the name
//! must equal the query up to case.

use serde_json::{Map, Value};

use crate::entity::Entity;
use crate::error::{EngineError, EngineResult, COUNTRY_NOT_FOUND_MESSAGE, REGION_NOT_FOUND_MESSAGE};
use crate::matcher::{eq_ignore_case, matches};
use crate::snapshot::Snapshot;

/// Country queries that select the US-specific regional snapshot.
const UNITED_STATES_ALIASES: [&str; 3] = ["us", "united states", "usa"];

/// Which regional snapshot a country query should be resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionScope {
    /// US per-state snapshot.
    UnitedStates,
    /// Generic per-country-with-regions snapshot.
    Global,
}

impl RegionScope {
    /// Picks the scope for a country query.
    ///
    /// Only the exact aliases `us`, `united states` and `usa` (any case)
    /// select [`RegionScope::UnitedStates`]; anything else, `America`
    /// included, goes to the generic snapshot.
    #[must_use]
    pub fn for_country(query: &str) -> Self {
        let query = query.to_lowercase();
        if UNITED_STATES_ALIASES.contains(&query.as_str()) {
            Self::UnitedStates
        } else {
            Self::Global
        }
    }
}

/// First entity of `snapshot`, in stored order, matching `query`.
///
/// Fails with the generic region message, as the totals and history
/// routes report it.
pub fn resolve_country<'a>(snapshot: &'a Snapshot, query: &str) -> EngineResult<&'a Entity> {
    find_country(snapshot, query)
        .ok_or_else(|| EngineError::country_not_found(query, REGION_NOT_FOUND_MESSAGE))
}

/// Region `region` of the first country matching `country`.
///
/// Fails with `CountryNotFound` if the country does not resolve and with
/// `RegionNotFound` if it resolves but has no region of that exact name.
pub fn resolve_region(snapshot: &Snapshot, country: &str, region: &str) -> EngineResult<Entity> {
    let resolved = resolve_country(snapshot, country)?;
    resolved
        .region_entities()
        .find(|candidate| eq_ignore_case(candidate.name(), region))
        .ok_or_else(|| EngineError::region_not_found(country, region))
}

/// The whole regions mapping of the first country matching `country`.
///
/// A country stored without regions yields an empty mapping.
pub fn resolve_regions<'a>(snapshot: &'a Snapshot, country: &str) -> EngineResult<RegionsView<'a>> {
    let resolved = find_country(snapshot, country)
        .ok_or_else(|| EngineError::country_not_found(country, COUNTRY_NOT_FOUND_MESSAGE))?;
    Ok(RegionsView {
        country: resolved,
    })
}

fn find_country<'a>(snapshot: &'a Snapshot, query: &str) -> Option<&'a Entity> {
    snapshot
        .entities()
        .iter()
        .find(|e| matches(query, e.name(), e.iso2(), e.iso3()))
}

/// Borrowed view of a resolved country's regions.
#[derive(Debug, Clone, Copy)]
pub struct RegionsView<'a> {
    country: &'a Entity,
}

impl<'a> RegionsView<'a> {
    /// The country the regions belong to.
    #[must_use]
    pub const fn country(&self) -> &'a Entity {
        self.country
    }

    /// Region names in stored order.
    pub fn names(&self) -> impl Iterator<Item = &'a str> {
        self.country
            .regions()
            .into_iter()
            .flat_map(|regions| regions.keys().map(String::as_str))
    }

    /// The mapping as JSON, `{}` when the country has no regions.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.country.regions().cloned().unwrap_or_else(Map::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DataType;
    use crate::error::ErrorKind;
    use crate::snapshot::SnapshotName;
    use serde_json::json;

    fn totals() -> Snapshot {
        Snapshot::from_value(
            SnapshotName::Current,
            json!([
                {"country": "China", "iso2": "CN", "iso3": "CHN", "confirmed": 1},
                {"country": "Finland", "iso2": "FI", "iso3": "FIN", "confirmed": 2},
                {"country": "India", "iso2": "IN", "iso3": "IND", "confirmed": 3},
                {"country": "South Korea", "iso2": "KR", "iso3": "KOR", "confirmed": 4},
                {"country": "France", "iso2": "FR", "iso3": "FRA", "confirmed": 5}
            ]),
        )
        .unwrap()
    }

    fn regions() -> Snapshot {
        Snapshot::from_value(
            SnapshotName::UsRegions(DataType::Confirmed),
            json!({
                "US": {
                    "iso2": "US",
                    "iso3": "USA",
                    "regions": {
                        "California": {"iso2": "", "iso3": "", "history": {"2021-01-01": 3}},
                        "New York": {"iso2": "", "iso3": "", "history": {"2021-01-01": 4}}
                    }
                },
                "Monaco": {"iso2": "MC", "iso3": "MCO"}
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_by_code_and_name() {
        let snap = totals();
        assert_eq!(resolve_country(&snap, "fr").unwrap().name(), "France");
        assert_eq!(resolve_country(&snap, "FRA").unwrap().name(), "France");
        assert_eq!(resolve_country(&snap, "kore").unwrap().name(), "South Korea");
    }

    #[test]
    fn test_first_match_wins() {
        let snap = totals();
        // "in" is a substring of China, Finland and India; stored order decides.
        assert_eq!(resolve_country(&snap, "in").unwrap().name(), "China");
        for _ in 0..10 {
            assert_eq!(resolve_country(&snap, "in").unwrap().name(), "China");
        }
        assert_eq!(resolve_country(&snap, "IND").unwrap().name(), "India");
    }

    #[test]
    fn test_country_not_found() {
        let err = resolve_country(&totals(), "germany").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CountryNotFound);
        assert_eq!(err.message(), REGION_NOT_FOUND_MESSAGE);
        assert!(resolve_country(&totals(), "").is_err());
    }

    #[test]
    fn test_region_exact_case_insensitive() {
        let snap = regions();
        let ca = resolve_region(&snap, "usa", "california").unwrap();
        assert_eq!(ca.name(), "California");
        assert_eq!(ca.history().unwrap()["2021-01-01"], json!(3));
        assert_eq!(resolve_region(&snap, "US", "NEW YORK").unwrap().name(), "New York");
    }

    #[test]
    fn test_region_substring_rejected() {
        let err = resolve_region(&regions(), "usa", "Calif").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RegionNotFound);
    }

    #[test]
    fn test_region_unknown_country() {
        let err = resolve_region(&regions(), "germany", "Bavaria").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CountryNotFound);
    }

    #[test]
    fn test_region_on_country_without_regions() {
        let err = resolve_region(&regions(), "monaco", "Monaco").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RegionNotFound);
    }

    #[test]
    fn test_all_regions() {
        let snap = regions();
        let view = resolve_regions(&snap, "usa").unwrap();
        assert_eq!(view.country().name(), "US");
        assert_eq!(view.names().collect::<Vec<_>>(), vec!["California", "New York"]);
        assert_eq!(view.to_json().as_object().unwrap().len(), 2);

        let empty = resolve_regions(&snap, "mco").unwrap();
        assert_eq!(empty.to_json(), json!({}));

        let err = resolve_regions(&snap, "germany").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CountryNotFound);
        assert_eq!(err.message(), COUNTRY_NOT_FOUND_MESSAGE);
    }

    #[test]
    fn test_region_scope() {
        assert_eq!(RegionScope::for_country("US"), RegionScope::UnitedStates);
        assert_eq!(RegionScope::for_country("usa"), RegionScope::UnitedStates);
        assert_eq!(RegionScope::for_country("United States"), RegionScope::UnitedStates);
        assert_eq!(RegionScope::for_country("united"), RegionScope::Global);
        assert_eq!(RegionScope::for_country("canada"), RegionScope::Global);
    }

    #[test]
    fn test_united_states_alias_needs_matching_key() {
        // The alias picks the US snapshot, but the entity there is keyed "US".
        assert_eq!(RegionScope::for_country("united states"), RegionScope::UnitedStates);
        let snap = regions();

        let err = resolve_regions(&snap, "united states").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CountryNotFound);
        let err = resolve_region(&snap, "united states", "California").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CountryNotFound);

        assert_eq!(resolve_region(&snap, "usa", "California").unwrap().name(), "California");
        assert_eq!(resolve_regions(&snap, "us").unwrap().country().name(), "US");
    }
}
