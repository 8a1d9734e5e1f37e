use std::hint::black_box;

use chrono::{Duration, NaiveDate};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use examind_sos::db::{SeriesKey, TimeSeries};
use examind_sos::models::{FieldValue, ObservationKind, PhenomenonId, Sample};
use examind_sos::services::{to_csv, Decimator};

fn series_rows(len: usize) -> Vec<Sample> {
    let start = NaiveDate::from_ymd_opt(2010, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    (0..len)
        .map(|i| {
            let depth = 5.0 + ((i as f64) * 0.01).sin();
            let temperature = 12.0 + ((i as f64) * 0.003).cos();
            Sample::new(
                start + Duration::minutes(i as i64),
                vec![FieldValue::Number(depth), FieldValue::Number(temperature)],
            )
        })
        .collect()
}

fn fields() -> Vec<PhenomenonId> {
    vec![
        PhenomenonId::from("urn:ogc:def:phenomenon:GEOM:depth"),
        PhenomenonId::from("urn:ogc:def:phenomenon:GEOM:temperature"),
    ]
}

fn bench_decimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("decimation");
    let decimator = Decimator::new(1000, ObservationKind::Timeseries);

    for len in [10_000usize, 100_000] {
        let rows = series_rows(len);
        group.bench_with_input(BenchmarkId::new("decimate_to_1000", len), &rows, |b, rows| {
            b.iter(|| decimator.decimate(black_box(rows)));
        });
    }

    group.finish();
}

fn bench_csv(c: &mut Criterion) {
    let mut group = c.benchmark_group("csv_export");
    let rows = series_rows(10_000);
    let fields = fields();

    group.bench_function("to_csv_10000_rows", |b| {
        b.iter(|| to_csv(black_box(&fields), ObservationKind::Timeseries, black_box(&rows)));
    });

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("series_merge");
    let rows = series_rows(10_000);
    let key = SeriesKey {
        procedure: "urn:ogc:object:sensor:GEOM:3".into(),
        phenomenon: "urn:ogc:def:phenomenon:GEOM:aggregatePhenomenon".into(),
        feature: "station-001".into(),
    };

    group.bench_function("merge_10000_then_overwrite", |b| {
        b.iter(|| {
            let mut series = TimeSeries::new(key.clone(), fields(), ObservationKind::Timeseries);
            series.merge(black_box(&rows), None).unwrap();
            series.merge(black_box(&rows[..5000]), None).unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_decimate, bench_csv, bench_merge);
criterion_main!(benches);
