//! Series merge invariants: idempotence, ordering and overlapping inserts.

mod support;

use chrono::{Duration, NaiveDateTime};
use proptest::prelude::*;

use examind_sos::db::{MergeSummary, SeriesKey, TimeSeries};
use examind_sos::models::{FieldValue, ObservationKind, Sample};
use examind_sos::worker::{GetResult, SosVersion};
use support::*;

fn base() -> NaiveDateTime {
    t("2000-01-01T00:00:00")
}

fn empty_series() -> TimeSeries {
    TimeSeries::new(
        SeriesKey {
            procedure: SENSOR_8.into(),
            phenomenon: DEPTH.into(),
            feature: STATION.into(),
        },
        vec![DEPTH.into()],
        ObservationKind::Timeseries,
    )
}

fn arb_samples() -> impl Strategy<Value = Vec<Sample>> {
    prop::collection::vec((0i64..500, -100.0f64..100.0), 0..40).prop_map(|rows| {
        rows.into_iter()
            .map(|(minutes, v)| Sample::new(base() + Duration::minutes(minutes), vec![FieldValue::Number(v)]))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_merging_twice_changes_nothing(samples in arb_samples()) {
        let mut once = empty_series();
        once.merge(&samples, None).unwrap();
        let mut twice = once.clone();
        let summary = twice.merge(&samples, None).unwrap();

        prop_assert_eq!(summary.inserted, 0);
        prop_assert_eq!(twice.samples(), once.samples());
        prop_assert_eq!(twice.period(), once.period());
    }

    #[test]
    fn prop_rows_are_strictly_ascending(first in arb_samples(), second in arb_samples()) {
        let mut series = empty_series();
        series.merge(&first, None).unwrap();
        series.merge(&second, None).unwrap();

        let rows = series.samples();
        prop_assert!(rows.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn prop_later_insert_wins(samples in arb_samples(), value in -100.0f64..100.0) {
        prop_assume!(!samples.is_empty());
        let mut series = empty_series();
        series.merge(&samples, None).unwrap();

        let target = samples[0].time;
        let summary = series
            .merge(&[Sample::new(target, vec![FieldValue::Number(value)])], None)
            .unwrap();
        prop_assert_eq!(summary, MergeSummary { inserted: 0, updated: 1 });

        let stored = series.samples().into_iter().find(|s| s.time == target).unwrap();
        prop_assert_eq!(stored.values, vec![FieldValue::Number(value)]);
    }
}

#[test]
fn test_overlapping_insert_replaces_and_extends() {
    let (worker, _) = geom_worker();
    insert(
        &worker,
        OFFERING_8,
        observation(
            SENSOR_8,
            rows(&[
                ("1999-12-01T00:00:00", 1.1),
                ("2000-01-01T00:00:00", 4.4),
                ("2000-01-15T00:00:00", 4.3),
            ]),
        ),
    );

    let result = worker
        .get_result(&GetResult {
            version: SosVersion::V200,
            offering: Some(OFFERING_8.to_string()),
            observed_property: Some(DEPTH.to_string()),
            ..Default::default()
        })
        .unwrap();

    assert!(result.values.starts_with(
        "1999-12-01T00:00:00.0,1.1@@2000-01-01T00:00:00.0,4.4@@\
         2000-01-15T00:00:00.0,4.3@@2000-02-01T00:00:00.0,4.6@@"
    ));
    assert_eq!(
        result.values,
        "1999-12-01T00:00:00.0,1.1@@2000-01-01T00:00:00.0,4.4@@2000-01-15T00:00:00.0,4.3@@\
         2000-02-01T00:00:00.0,4.6@@2000-03-01T00:00:00.0,4.7@@2000-04-01T00:00:00.0,4.8@@"
    );
}

#[test]
fn test_concurrent_inserts_into_distinct_series() {
    let (worker, repo) = empty_worker();
    register(&worker, SENSOR_3);
    register(&worker, SENSOR_8);
    let worker = std::sync::Arc::new(worker);

    let handles: Vec<_> = [(SENSOR_3, OFFERING_3), (SENSOR_8, OFFERING_8)]
        .into_iter()
        .map(|(sensor, offering)| {
            let worker = std::sync::Arc::clone(&worker);
            std::thread::spawn(move || {
                for day in 0..50 {
                    let time = base() + Duration::days(day);
                    let sample = Sample::new(time, vec![FieldValue::Number(day as f64)]);
                    insert(&worker, offering, observation(sensor, vec![sample]));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(repo.series_count(), 2);
    let slices = examind_sos::db::ObservationRepository::get_samples(&repo, &Default::default()).unwrap();
    assert!(slices.iter().all(|s| s.samples.len() == 50));
}
