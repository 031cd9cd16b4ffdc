use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use covid19_api::{
    DataType, EngineError, ErrorKind, InMemorySource, ManualClock, ResultCache, Snapshot,
    SnapshotName, SnapshotStore, StatsEngine,
};
use serde_json::json;

fn source() -> InMemorySource {
    InMemorySource::new()
        .with(
            SnapshotName::Current,
            json!([
                {"country": "France", "iso2": "FR", "iso3": "FRA", "confirmed": 120, "deaths": 3},
                {"country": "US", "iso2": "US", "iso3": "USA", "confirmed": 900, "deaths": 40},
                {"country": "India", "iso2": "IN", "iso3": "IND", "confirmed": 70, "deaths": 1}
            ]),
        )
        .with(
            SnapshotName::History(DataType::Confirmed),
            json!({
                "US": {"iso2": "US", "iso3": "USA", "history": {"2021-01-01": "10", "2021-01-02": "12"}},
                "FR": {"iso2": "FR", "iso3": "FRA", "history": {"2021-01-01": "5", "2021-01-02": "6"}}
            }),
        )
        .with(
            SnapshotName::UsRegions(DataType::Confirmed),
            json!({
                "US": {
                    "iso2": "US",
                    "iso3": "USA",
                    "regions": {
                        "California": {"iso2": "", "iso3": "", "history": {"2021-01-01": 4}},
                        "Texas": {"iso2": "", "iso3": "", "history": {"2021-01-01": 6}}
                    }
                }
            }),
        )
        .with(
            SnapshotName::Regions(DataType::Confirmed),
            json!({
                "France": {"iso2": "FR", "iso3": "FRA", "regions": {}},
                "Monaco": {"iso2": "MC", "iso3": "MCO"}
            }),
        )
}

fn engine_with_clock() -> (StatsEngine, Arc<InMemorySource>, Arc<ManualClock>) {
    let source = Arc::new(source());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2021, 1, 3, 0, 0, 0).unwrap()));
    let store = Arc::new(SnapshotStore::new(source.clone()));
    let cache = Arc::new(ResultCache::new(Duration::from_secs(15 * 60)).with_clock(clock.clone()));
    (StatsEngine::new(store, cache), source, clock)
}

#[test]
fn france_by_iso2() {
    let (engine, _, _) = engine_with_clock();
    let france = engine.all_country("fr").unwrap();
    assert_eq!(
        *france,
        json!({"country": "France", "iso2": "FR", "iso3": "FRA", "confirmed": 120, "deaths": 3})
    );
}

#[test]
fn germany_is_not_found() {
    let (engine, _, _) = engine_with_clock();
    let err = engine.all_country("germany").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CountryNotFound);
    assert_eq!(err.status(), 404);
    assert_eq!(
        err.to_body(),
        json!({"error": "CountryNotFound : This region cannot be found. Please try again."})
    );
}

#[test]
fn world_total_sums_countries() {
    let (engine, _, _) = engine_with_clock();
    let total = engine.history_total("confirmed").unwrap();
    assert_eq!(*total, json!({"history": {"2021-01-01": 15, "2021-01-02": 18}}));
}

#[test]
fn us_region_lookup_is_exact() {
    let (engine, _, _) = engine_with_clock();
    let california = engine.history_region("confirmed", "usa", "california").unwrap();
    assert_eq!(california["history"]["2021-01-01"], json!(4));

    let err = engine.history_region("confirmed", "usa", "Calif").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RegionNotFound);
    assert_eq!(err.message(), "This region cannot be found. Please try again.");
}

#[test]
fn all_regions_routes() {
    let (engine, _, _) = engine_with_clock();
    let us = engine.history_regions("confirmed", "USA").unwrap();
    let names: Vec<&String> = us.as_object().unwrap().keys().collect();
    assert_eq!(names, vec!["California", "Texas"]);

    assert_eq!(*engine.history_regions("confirmed", "france").unwrap(), json!({}));
    assert_eq!(*engine.history_regions("confirmed", "monaco").unwrap(), json!({}));

    let err = engine.history_regions("confirmed", "germany").unwrap_err();
    assert_eq!(err.message(), "This country cannot be found. Please try again.");
}

#[test]
fn short_query_resolves_to_first_match() {
    let (engine, _, _) = engine_with_clock();
    assert_eq!(engine.all_country("us").unwrap()["country"], json!("US"));
    assert_eq!(engine.all_country("in").unwrap()["country"], json!("India"));
    // "a" is a substring of both France and India.
    for _ in 0..5 {
        assert_eq!(engine.all_country("a").unwrap()["country"], json!("France"));
    }
}

#[test]
fn cache_serves_until_ttl() {
    let (engine, _, clock) = engine_with_clock();
    assert_eq!(engine.all_country("fr").unwrap()["confirmed"], json!(120));

    // A swapped snapshot invalidates entries computed before it.
    engine
        .store()
        .replace(
            Snapshot::from_value(
                SnapshotName::Current,
                json!([{"country": "France", "iso2": "FR", "iso3": "FRA", "confirmed": 130}]),
            )
            .unwrap(),
        )
        .unwrap();
    assert_eq!(engine.all_country("fr").unwrap()["confirmed"], json!(130));

    let stats = engine.cache().stats();
    clock.advance(Duration::from_secs(60));
    engine.all_country("fr").unwrap();
    assert_eq!(engine.cache().stats().hits, stats.hits + 1);

    clock.advance(Duration::from_secs(15 * 60));
    engine.all_country("fr").unwrap();
    assert_eq!(engine.cache().stats().misses, stats.misses + 1);
}

#[test]
fn identical_requests_compute_once() {
    let (engine, _, _) = engine_with_clock();
    let first = engine.history_total("confirmed").unwrap();
    let second = engine.history_total("confirmed").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(engine.cache().stats().misses, 1);
}

#[test]
fn unknown_data_type_is_data_format_error() {
    let (engine, _, _) = engine_with_clock();
    for err in [
        engine.history("cases").unwrap_err(),
        engine.history_total("cases").unwrap_err(),
        engine.history_country("cases", "fr").unwrap_err(),
        engine.history_region("cases", "usa", "texas").unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::DataFormatError);
        assert_eq!(err.status(), 500);
    }
}

#[test]
fn concurrent_readers_see_whole_snapshots() {
    let (engine, _, _) = engine_with_clock();
    let engine = Arc::new(engine);
    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(std::thread::spawn(move || {
            for _ in 0..200 {
                let outcome: Result<_, EngineError> = if i % 2 == 0 {
                    engine.all()
                } else {
                    engine.history_total("confirmed")
                };
                assert!(outcome.is_ok());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}
