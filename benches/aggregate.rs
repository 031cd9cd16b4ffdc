use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use serde_json::{Map, Value};

use covid19_api::{
    aggregate_world, resolve_country, DataType, InMemorySource, Snapshot, SnapshotName, StatsEngine,
};

const COUNTRIES: usize = 200;
const DAYS: usize = 365;

/// Keyed history snapshot shaped like the ingestion output: 200 countries x 365 days.
fn history_value() -> Value {
    let mut root = Map::new();
    for c in 0..COUNTRIES {
        let mut history = Map::new();
        for d in 0..DAYS {
            let date = format!("{}/{}/21", d / 28 + 1, d % 28 + 1);
            // Counts stored as strings, like the CSV-derived files.
            history.insert(date, Value::String((c * d).to_string()));
        }
        let mut record = Map::new();
        record.insert("iso2".into(), Value::String(format!("C{c}")));
        record.insert("iso3".into(), Value::String(format!("CC{c}")));
        record.insert("history".into(), Value::Object(history));
        root.insert(format!("Country {c}"), Value::Object(record));
    }
    Value::Object(root)
}

fn bench_aggregate_world(c: &mut Criterion) {
    let snapshot =
        Snapshot::from_value(SnapshotName::History(DataType::Confirmed), history_value()).unwrap();

    let mut group = c.benchmark_group("aggregate");
    group.throughput(Throughput::Elements((COUNTRIES * DAYS) as u64));
    group.bench_function("world_total", |b| {
        b.iter(|| black_box(aggregate_world(black_box(&snapshot)).unwrap()));
    });
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let snapshot =
        Snapshot::from_value(SnapshotName::History(DataType::Confirmed), history_value()).unwrap();

    c.bench_function("resolve/last_country_by_name", |b| {
        b.iter(|| black_box(resolve_country(&snapshot, black_box("country 199")).unwrap()));
    });
    c.bench_function("resolve/miss", |b| {
        b.iter(|| black_box(resolve_country(&snapshot, black_box("atlantis")).is_err()));
    });
}

fn bench_cached_lookup(c: &mut Criterion) {
    let source = InMemorySource::new().with(SnapshotName::History(DataType::Confirmed), history_value());
    let engine = StatsEngine::with_source(Arc::new(source));
    // Warm the snapshot and the cache entry.
    engine.history_total("confirmed").unwrap();

    c.bench_function("engine/history_total_cached", |b| {
        b.iter(|| black_box(engine.history_total(black_box("confirmed")).unwrap()));
    });
}

criterion_group!(aggregate, bench_aggregate_world, bench_resolve, bench_cached_lookup);
criterion_main!(aggregate);
