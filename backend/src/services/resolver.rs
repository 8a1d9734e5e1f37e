//! Mapping between request identifiers and store partitions.
//!
//! Sensor ids are `<sensor_id_base><suffix>`; the suffix names the sensor's
//! offering (`offering-<suffix>`) and its template ids. Composite phenomena are
//! expanded into their ordered component fields.

use std::collections::BTreeMap;

use crate::db::{FullRepository, RepositoryResult, SampleKey, SeriesSlice};
use crate::db::series::AxisValue;
use crate::models::{FieldValue, ObservationKind, OfferingId, Phenomenon, PhenomenonId, ProcedureId, Sample};

/// Sensor id with the configured base stripped; the whole id when it lacks the base.
pub fn procedure_suffix<'a>(sensor_id_base: &str, procedure: &'a ProcedureId) -> &'a str {
    procedure
        .as_str()
        .strip_prefix(sensor_id_base)
        .filter(|s| !s.is_empty())
        .unwrap_or(procedure.as_str())
}

/// Offering a newly registered sensor is published under.
pub fn offering_for(sensor_id_base: &str, procedure: &ProcedureId) -> OfferingId {
    OfferingId::new(format!("offering-{}", procedure_suffix(sensor_id_base, procedure)))
}

/// Prefix of the generated template ids of a procedure.
pub fn template_prefix(template_id_base: &str, sensor_id_base: &str, procedure: &ProcedureId) -> String {
    format!("{}{}", template_id_base, procedure_suffix(sensor_id_base, procedure))
}

/// Ordered, duplicate-free field list of `phenomena`.
pub fn expand_fields(phenomena: &[Phenomenon]) -> Vec<PhenomenonId> {
    let mut fields: Vec<PhenomenonId> = Vec::new();
    for field in phenomena.iter().flat_map(Phenomenon::fields) {
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    fields
}

/// Look up every id, returning the first unknown one as the error.
pub fn resolve_phenomena(
    repo: &dyn FullRepository,
    ids: &[PhenomenonId],
) -> RepositoryResult<Result<Vec<Phenomenon>, PhenomenonId>> {
    let mut resolved = Vec::with_capacity(ids.len());
    for id in ids {
        match repo.get_phenomenon(id)? {
            Some(p) => resolved.push(p),
            None => return Ok(Err(id.clone())),
        }
    }
    Ok(Ok(resolved))
}

/// Fields of every series of a procedure, in series order.
pub fn procedure_fields(repo: &dyn FullRepository, procedure: &ProcedureId) -> RepositoryResult<Vec<PhenomenonId>> {
    let mut fields: Vec<PhenomenonId> = Vec::new();
    for info in repo.list_series(procedure)? {
        for field in info.fields {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
    }
    Ok(fields)
}

/// Rows of `slice` restricted to `columns`, missing where the slice lacks a column.
pub fn project(slice: &SeriesSlice, columns: &[PhenomenonId]) -> Vec<Sample> {
    let positions: Vec<Option<usize>> = columns
        .iter()
        .map(|c| slice.fields.iter().position(|f| f == c))
        .collect();
    slice
        .samples
        .iter()
        .map(|sample| {
            let values = positions
                .iter()
                .map(|pos| {
                    pos.and_then(|i| sample.values.get(i).cloned())
                        .unwrap_or(FieldValue::Missing)
                })
                .collect();
            Sample::new(sample.time, values)
        })
        .collect()
}

/// Merge the slices of one procedure into rows over `columns`.
///
/// Rows sharing a key (the timestamp, plus the first column for profiles) are
/// joined column by column, the first non-missing value winning. Slices
/// carrying none of the columns are ignored.
pub fn join_slices(slices: &[SeriesSlice], columns: &[PhenomenonId], shape: ObservationKind) -> Vec<Sample> {
    let mut rows: BTreeMap<SampleKey, Vec<FieldValue>> = BTreeMap::new();
    for slice in slices {
        if !slice.fields.iter().any(|f| columns.contains(f)) {
            continue;
        }
        for sample in project(slice, columns) {
            let axis = match shape {
                ObservationKind::Timeseries => None,
                ObservationKind::Profile => sample.values.first().and_then(FieldValue::as_f64).map(AxisValue),
            };
            let key = SampleKey {
                time: sample.time,
                axis,
            };
            match rows.get_mut(&key) {
                Some(existing) => {
                    for (slot, value) in existing.iter_mut().zip(sample.values) {
                        if slot.is_missing() {
                            *slot = value;
                        }
                    }
                }
                None => {
                    rows.insert(key, sample.values);
                }
            }
        }
    }
    rows.into_iter()
        .map(|(key, values)| Sample::new(key.time, values))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SeriesKey;
    use crate::models::parse_time;

    const BASE: &str = "urn:ogc:object:sensor:GEOM:";

    fn slice(phenomenon: &str, rows: &[(&str, f64)]) -> SeriesSlice {
        SeriesSlice {
            key: SeriesKey {
                procedure: "urn:ogc:object:sensor:GEOM:3".into(),
                phenomenon: phenomenon.into(),
                feature: "station-001".into(),
            },
            fields: vec![PhenomenonId::from(phenomenon)],
            shape: ObservationKind::Timeseries,
            period: None,
            samples: rows
                .iter()
                .map(|(t, v)| Sample::new(parse_time(t).unwrap(), vec![FieldValue::Number(*v)]))
                .collect(),
        }
    }

    #[test]
    fn test_suffix_and_offering_naming() {
        let id = ProcedureId::from("urn:ogc:object:sensor:GEOM:3");
        assert_eq!(procedure_suffix(BASE, &id), "3");
        assert_eq!(offering_for(BASE, &id).as_str(), "offering-3");
        assert_eq!(
            template_prefix("urn:ogc:object:observation:template:GEOM:", BASE, &id),
            "urn:ogc:object:observation:template:GEOM:3"
        );
        let foreign = ProcedureId::from("sensor-x");
        assert_eq!(procedure_suffix(BASE, &foreign), "sensor-x");
    }

    #[test]
    fn test_expand_fields_keeps_component_order() {
        let aggregate = Phenomenon::composite("aggregatePhenomenon", vec!["depth".into(), "temperature".into()]);
        let fields = expand_fields(&[aggregate, Phenomenon::simple("temperature"), Phenomenon::simple("salinity")]);
        let names: Vec<&str> = fields.iter().map(PhenomenonId::as_str).collect();
        assert_eq!(names, vec!["depth", "temperature", "salinity"]);
    }

    #[test]
    fn test_join_fills_columns_from_several_series() {
        let depth = slice("depth", &[("2007-05-01T02:59:00", 6.56), ("2007-05-01T03:59:00", 6.55)]);
        let temp = slice("temperature", &[("2007-05-01T03:59:00", 12.0)]);
        let columns: Vec<PhenomenonId> = vec!["depth".into(), "temperature".into()];
        let rows = join_slices(&[depth, temp], &columns, ObservationKind::Timeseries);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values, vec![FieldValue::Number(6.56), FieldValue::Missing]);
        assert_eq!(rows[1].values, vec![FieldValue::Number(6.55), FieldValue::Number(12.0)]);
    }

    #[test]
    fn test_join_ignores_unrelated_series() {
        let salinity = slice("salinity", &[("2007-05-01T02:59:00", 35.0)]);
        let rows = join_slices(&[salinity], &["depth".into()], ObservationKind::Timeseries);
        assert!(rows.is_empty());
    }
}
