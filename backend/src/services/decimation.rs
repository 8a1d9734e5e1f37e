//! Bucket min/max downsampling and CSV export.
//!
//! The axis (epoch milliseconds, or the profile coordinate) is cut into
//! `width` buckets of `span / (width - 1)`, so the first sample opens bucket 0
//! and the last one opens bucket `width - 1`. Each bucket keeps, per value
//! column, the row holding the column minimum and the row holding its maximum;
//! the first and last rows are always kept. Kept rows come out once, in input
//! order, so the output is reproducible and holds at most
//! `2 * columns * width + 2` rows.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::models::{epoch_millis, format_time, FieldValue, ObservationKind, PhenomenonId, Sample};

/// Per-bucket extrema of one column: (value, row index).
#[derive(Debug, Clone, Copy)]
struct Extrema {
    min: (f64, usize),
    max: (f64, usize),
}

impl Extrema {
    fn new(value: f64, row: usize) -> Self {
        Self {
            min: (value, row),
            max: (value, row),
        }
    }

    fn offer(&mut self, value: f64, row: usize) {
        // first occurrence of the minimum, last occurrence of the maximum
        if value < self.min.0 {
            self.min = (value, row);
        }
        if value >= self.max.0 {
            self.max = (value, row);
        }
    }
}

/// Downsampler over ordered rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimator {
    width: usize,
    shape: ObservationKind,
}

impl Decimator {
    pub fn new(width: usize, shape: ObservationKind) -> Self {
        Self { width, shape }
    }

    fn axis_of(&self, sample: &Sample) -> Option<f64> {
        match self.shape {
            ObservationKind::Timeseries => Some(epoch_millis(&sample.time) as f64),
            ObservationKind::Profile => sample.values.first().and_then(FieldValue::as_f64),
        }
    }

    /// Indices of the value columns; the profile axis column is not one of them.
    fn value_columns(&self, rows: &[Sample]) -> Vec<usize> {
        let count = rows.first().map_or(0, |r| r.values.len());
        match self.shape {
            ObservationKind::Profile if count > 1 => (1..count).collect(),
            _ => (0..count).collect(),
        }
    }

    /// Keep the rows that preserve each bucket's extrema.
    ///
    /// A zero width, or no more rows than the width, returns the rows unchanged.
    pub fn decimate(&self, rows: &[Sample]) -> Vec<Sample> {
        if self.width == 0 || rows.len() <= self.width {
            return rows.to_vec();
        }

        let axes: Vec<Option<f64>> = rows.iter().map(|r| self.axis_of(r)).collect();
        let (lo, hi) = axes
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), a| (lo.min(*a), hi.max(*a)));
        if !lo.is_finite() {
            return rows.to_vec();
        }
        // a single bucket gives an infinite step
        let step = (hi - lo) / self.width.saturating_sub(1) as f64;
        let bucket_of = |axis: f64| -> usize {
            if step.is_finite() && step > 0.0 {
                (((axis - lo) / step) as usize).min(self.width - 1)
            } else {
                0
            }
        };

        let columns = self.value_columns(rows);
        let mut buckets: Vec<Vec<Option<Extrema>>> = vec![vec![None; columns.len()]; self.width];
        for (row, sample) in rows.iter().enumerate() {
            let Some(axis) = axes[row] else { continue };
            let bucket = &mut buckets[bucket_of(axis)];
            for (slot, &col) in bucket.iter_mut().zip(&columns) {
                let Some(value) = sample.values.get(col).and_then(FieldValue::as_f64) else {
                    continue;
                };
                match slot {
                    Some(extrema) => extrema.offer(value, row),
                    None => *slot = Some(Extrema::new(value, row)),
                }
            }
        }

        let mut kept: BTreeSet<usize> = BTreeSet::new();
        kept.insert(0);
        kept.insert(rows.len() - 1);
        for extrema in buckets.iter().flatten().flatten() {
            kept.insert(extrema.min.1);
            kept.insert(extrema.max.1);
        }
        kept.into_iter().map(|i| rows[i].clone()).collect()
    }
}

/// CSV header: `time,<field>...`, or only the fields for profiles.
pub fn csv_header(fields: &[PhenomenonId], shape: ObservationKind) -> String {
    let names = fields.iter().map(PhenomenonId::as_str).collect::<Vec<_>>().join(",");
    match shape {
        ObservationKind::Timeseries => format!("time,{}", names),
        ObservationKind::Profile => names,
    }
}

/// Render rows as CSV; every line, the last included, ends with `\n`.
pub fn to_csv(fields: &[PhenomenonId], shape: ObservationKind, rows: &[Sample]) -> String {
    let mut out = csv_header(fields, shape);
    out.push('\n');
    for row in rows {
        let mut first = true;
        if shape == ObservationKind::Timeseries {
            out.push_str(&format_time(&row.time));
            first = false;
        }
        for value in &row.values {
            if !first {
                out.push(',');
            }
            first = false;
            let _ = write!(out, "{}", value);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_time;
    use chrono::Duration;

    fn hourly(values: &[f64]) -> Vec<Sample> {
        let start = parse_time("2007-05-01T00:00:00").unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::new(start + Duration::hours(i as i64), vec![FieldValue::Number(*v)]))
            .collect()
    }

    #[test]
    fn test_small_input_is_returned_unchanged() {
        let rows = hourly(&[1.0, 2.0, 3.0]);
        assert_eq!(Decimator::new(10, ObservationKind::Timeseries).decimate(&rows), rows);
        assert_eq!(Decimator::new(0, ObservationKind::Timeseries).decimate(&rows), rows);
    }

    #[test]
    fn test_keeps_bucket_extrema_in_input_order() {
        // 8 hourly rows, buckets of 3.5 hours: rows 0-3, 4-6, then 7
        let rows = hourly(&[5.0, 1.0, 9.0, 5.0, 5.0, 7.0, 2.0, 5.0]);
        let kept = Decimator::new(3, ObservationKind::Timeseries).decimate(&rows);
        let values: Vec<f64> = kept.iter().map(|r| r.values[0].as_f64().unwrap()).collect();
        assert_eq!(values, vec![5.0, 1.0, 9.0, 7.0, 2.0, 5.0]);
    }

    #[test]
    fn test_flat_bucket_drops_inner_rows() {
        // buckets of 2.5 hours: rows 0-2 share the first bucket
        let rows = hourly(&[4.0, 4.0, 4.0, 4.0, 4.0, 4.0]);
        let kept = Decimator::new(3, ObservationKind::Timeseries).decimate(&rows);
        let hours: Vec<i64> = kept
            .iter()
            .map(|r| (r.time - rows[0].time).num_hours())
            .collect();
        assert_eq!(hours, vec![0, 2, 3, 4, 5]);
    }

    #[test]
    fn test_single_bucket_keeps_extrema_and_bounds() {
        let rows = hourly(&[3.0, 1.0, 8.0, 5.0, 3.0]);
        let kept = Decimator::new(1, ObservationKind::Timeseries).decimate(&rows);
        let values: Vec<f64> = kept.iter().map(|r| r.values[0].as_f64().unwrap()).collect();
        assert_eq!(values, vec![3.0, 1.0, 8.0, 3.0]);
    }

    #[test]
    fn test_output_is_bounded() {
        let values: Vec<f64> = (0..1000).map(|i| ((i * 37) % 101) as f64).collect();
        let rows = hourly(&values);
        let kept = Decimator::new(10, ObservationKind::Timeseries).decimate(&rows);
        assert!(kept.len() <= 2 * 10 + 2);
        assert_eq!(kept.first(), rows.first());
        assert_eq!(kept.last(), rows.last());
        assert!(kept.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_profile_buckets_on_axis_column() {
        let t = parse_time("2007-05-01T00:00:00").unwrap();
        let rows: Vec<Sample> = (0..20)
            .map(|i| {
                Sample::new(
                    t,
                    vec![FieldValue::Number(i as f64), FieldValue::Number(if i == 7 { 99.0 } else { 10.0 })],
                )
            })
            .collect();
        let kept = Decimator::new(2, ObservationKind::Profile).decimate(&rows);
        assert!(kept.iter().any(|r| r.values[1] == FieldValue::Number(99.0)));
        assert!(kept.len() <= 2 * 2 + 2);
    }

    #[test]
    fn test_csv_layout() {
        let rows = hourly(&[6.56, 12.0]);
        let fields = vec![PhenomenonId::from("urn:ogc:def:phenomenon:GEOM:depth")];
        assert_eq!(
            to_csv(&fields, ObservationKind::Timeseries, &rows),
            "time,urn:ogc:def:phenomenon:GEOM:depth\n\
             2007-05-01T00:00:00.0,6.56\n\
             2007-05-01T01:00:00.0,12.0\n"
        );

        let profile = vec![Sample::new(rows[0].time, vec![FieldValue::Number(2.0), FieldValue::Missing])];
        let fields = vec![PhenomenonId::from("depth"), PhenomenonId::from("temperature")];
        assert_eq!(
            to_csv(&fields, ObservationKind::Profile, &profile),
            "depth,temperature\n2.0,\n"
        );
    }
}
