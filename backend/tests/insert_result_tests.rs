//! Result templates, InsertResult, GetResult and InsertObservation checks.

mod support;

use examind_sos::filter::TemporalFilter;
use examind_sos::models::{FieldValue, Sample};
use examind_sos::services::TextEncoding;
use examind_sos::worker::{
    ExceptionCode, GetResult, GetResultTemplate, InsertObservation, InsertResult,
    InsertResultTemplate, SosFault, SosVersion, SosWorker,
};
use support::*;

fn template_request() -> InsertResultTemplate {
    InsertResultTemplate {
        version: SosVersion::V200,
        identifier: None,
        offering: Some(OFFERING_8.to_string()),
        procedure: Some(SENSOR_8.to_string()),
        observed_property: Some(DEPTH.to_string()),
        feature_of_interest: Some(station()),
        encoding: None,
    }
}

fn insert_template(worker: &SosWorker) -> String {
    worker
        .insert_result_template(&template_request())
        .unwrap()
        .template
        .to_string()
}

fn assert_fault(fault: SosFault, code: ExceptionCode, locator: &str) {
    assert_eq!(fault.code, code, "{}", fault);
    assert_eq!(fault.locator.as_deref(), Some(locator), "{}", fault);
}

#[test]
fn test_template_ids_are_numbered_per_procedure() {
    let (worker, _) = geom_worker();
    let first = insert_template(&worker);
    assert_eq!(first, "urn:ogc:object:observation:template:GEOM:8-0");
    // same combination, same template
    assert_eq!(insert_template(&worker), first);

    let other = worker
        .insert_result_template(&InsertResultTemplate {
            feature_of_interest: Some(examind_sos::models::FeatureOfInterest::point("station-009", 1.0, 2.0)),
            ..template_request()
        })
        .unwrap();
    assert_eq!(other.template.as_str(), "urn:ogc:object:observation:template:GEOM:8-1");
}

#[test]
fn test_client_identifier_is_kept() {
    let (worker, _) = geom_worker();
    let inserted = worker
        .insert_result_template(&InsertResultTemplate {
            identifier: Some("my-template".to_string()),
            ..template_request()
        })
        .unwrap();
    assert_eq!(inserted.template.as_str(), "my-template");
}

#[test]
fn test_insert_result_template_requires_parameters() {
    let (worker, _) = geom_worker();
    let err = worker
        .insert_result_template(&InsertResultTemplate {
            offering: None,
            procedure: None,
            ..template_request()
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::MissingParameterValue, "offering");

    let err = worker
        .insert_result_template(&InsertResultTemplate {
            procedure: Some("urn:ogc:object:sensor:GEOM:404".to_string()),
            ..template_request()
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::InvalidParameterValue, "procedure");
}

#[test]
fn test_insert_result_then_get_result() {
    let (worker, _) = geom_worker();
    let template = insert_template(&worker);

    let inserted = worker
        .insert_result(&InsertResult {
            version: SosVersion::V200,
            template: Some(template.clone()),
            result_values: Some("2000-02-01T00:00:00.0,5.0@@2000-05-01T00:00:00.0,4.9@@".to_string()),
        })
        .unwrap();
    assert_eq!(inserted.inserted, 1);
    assert_eq!(inserted.updated, 1);

    let result = worker
        .get_result(&GetResult {
            version: SosVersion::V200,
            template: Some(template.clone()),
            temporal_filters: vec![TemporalFilter::After(t("2000-01-15"))],
            ..Default::default()
        })
        .unwrap();
    assert_eq!(result.template.as_ref().map(|t| t.as_str()), Some(template.as_str()));
    assert_eq!(
        result.values,
        "2000-02-01T00:00:00.0,5.0@@2000-03-01T00:00:00.0,4.7@@\
         2000-04-01T00:00:00.0,4.8@@2000-05-01T00:00:00.0,4.9@@"
    );
}

#[test]
fn test_insert_result_validation() {
    let (worker, _) = geom_worker();
    let template = insert_template(&worker);

    let err = worker
        .insert_result(&InsertResult {
            version: SosVersion::V200,
            template: None,
            result_values: None,
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::MissingParameterValue, "template");

    let err = worker
        .insert_result(&InsertResult {
            version: SosVersion::V200,
            template: Some("unknown".to_string()),
            result_values: Some("x".to_string()),
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::InvalidParameterValue, "template");

    let err = worker
        .insert_result(&InsertResult {
            version: SosVersion::V200,
            template: Some(template.clone()),
            result_values: None,
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::MissingParameterValue, "resultValues");

    let err = worker
        .insert_result(&InsertResult {
            version: SosVersion::V200,
            template: Some(template),
            result_values: Some("2000-02-01T00:00:00.0,5.0,6.0@@".to_string()),
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::InvalidParameterValue, "resultValues");
}

#[test]
fn test_get_result_parameters() {
    let (worker, _) = geom_worker();
    let err = worker
        .get_result(&GetResult {
            version: SosVersion::V100,
            offering: Some(OFFERING_8.to_string()),
            ..Default::default()
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::MissingParameterValue, "ObservationTemplateId");

    let err = worker
        .get_result(&GetResult {
            version: SosVersion::V200,
            ..Default::default()
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::MissingParameterValue, "offering");

    let err = worker
        .get_result(&GetResult {
            version: SosVersion::V200,
            template: Some("unknown".to_string()),
            ..Default::default()
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::InvalidParameterValue, "template");
}

#[test]
fn test_get_result_template_describes_structure() {
    let (worker, _) = geom_worker();
    let structure = worker
        .get_result_template(&GetResultTemplate {
            version: SosVersion::V200,
            offering: Some(OFFERING_3.to_string()),
            observed_property: Some(DEPTH.to_string()),
        })
        .unwrap();
    assert_eq!(structure.fields, vec![examind_sos::models::PhenomenonId::from(DEPTH)]);
    assert_eq!(structure.encoding, TextEncoding::default());

    let err = worker
        .get_result_template(&GetResultTemplate {
            version: SosVersion::V200,
            offering: Some(OFFERING_3.to_string()),
            observed_property: None,
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::MissingParameterValue, "observedProperty");
}

#[test]
fn test_insert_observation_validation() {
    let (worker, repo) = geom_worker();
    let err = worker
        .insert_observation(&InsertObservation {
            version: SosVersion::V100,
            observations: vec![observation(SENSOR_3, sensor_3_depths())],
            ..Default::default()
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::MissingParameterValue, "AssignedSensorId");

    let err = worker
        .insert_observation(&InsertObservation {
            version: SosVersion::V200,
            observations: vec![observation(SENSOR_3, sensor_3_depths())],
            ..Default::default()
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::MissingParameterValue, "offering");

    let err = worker
        .insert_observation(&InsertObservation {
            version: SosVersion::V200,
            offerings: vec![OFFERING_3.to_string()],
            ..Default::default()
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::MissingParameterValue, "observation");

    let wide = vec![Sample::new(
        t("2007-05-02T00:00:00"),
        vec![FieldValue::Number(1.0), FieldValue::Number(2.0)],
    )];
    let err = worker
        .insert_observation(&InsertObservation {
            version: SosVersion::V200,
            offerings: vec![OFFERING_3.to_string()],
            observations: vec![
                observation(SENSOR_3, rows(&[("2007-05-03T00:00:00", 1.0)])),
                observation(SENSOR_3, wide),
            ],
            ..Default::default()
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::InvalidParameterValue, "result");
    // nothing from the rejected batch was written
    let slices = examind_sos::db::ObservationRepository::get_samples(
        &repo,
        &examind_sos::db::SampleQuery::for_procedure(SENSOR_3.into()),
    )
    .unwrap();
    assert_eq!(slices[0].samples.len(), 15);
}

#[test]
fn test_v100_insert_uses_assigned_sensor() {
    let (worker, _) = geom_worker();
    let inserted = worker
        .insert_observation(&InsertObservation {
            version: SosVersion::V100,
            assigned_sensor_id: Some(SENSOR_3.to_string()),
            observations: vec![observation("ignored", rows(&[("2007-05-02T00:00:00", 6.5)]))],
            ..Default::default()
        })
        .unwrap();
    assert_eq!(inserted.observation_ids.len(), 1);
    assert_eq!(inserted.observation_ids[0].as_str(), "urn:ogc:object:observation:GEOM:3");
}

#[test]
fn test_template_must_match_offering_and_have_usable_separators() {
    let (worker, _) = geom_worker();
    let err = worker
        .insert_result_template(&InsertResultTemplate {
            offering: Some(OFFERING_3.to_string()),
            ..template_request()
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::InvalidParameterValue, "offering");

    let err = worker
        .insert_result_template(&InsertResultTemplate {
            encoding: Some(TextEncoding {
                decimal_separator: ",".to_string(),
                ..TextEncoding::default()
            }),
            ..template_request()
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::InvalidParameterValue, "resultEncoding");
}

#[test]
fn test_insert_into_foreign_offering_is_rejected() {
    let (worker, repo) = geom_worker();
    let err = worker
        .insert_observation(&InsertObservation {
            version: SosVersion::V200,
            offerings: vec![OFFERING_3.to_string()],
            observations: vec![observation(SENSOR_8, rows(&[("2000-06-01T00:00:00", 5.1)]))],
            ..Default::default()
        })
        .unwrap_err();
    assert_fault(err, ExceptionCode::InvalidParameterValue, "offering");

    // offering-3 did not grow a second procedure
    let offering = examind_sos::db::SensorRepository::get_offering(&repo, &OFFERING_3.into())
        .unwrap()
        .unwrap();
    assert_eq!(offering.procedures.len(), 1);
    let slices = examind_sos::db::ObservationRepository::get_samples(
        &repo,
        &examind_sos::db::SampleQuery::for_procedure(SENSOR_8.into()),
    )
    .unwrap();
    assert_eq!(slices[0].samples.len(), 4);
}
