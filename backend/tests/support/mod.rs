//! Shared fixtures: the GEOM sensor data set and env helpers.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use examind_sos::config::InMemoryConfigStore;
use examind_sos::db::LocalRepository;
use examind_sos::models::{parse_time, FeatureOfInterest, NewObservation, Phenomenon, Sample};
use examind_sos::services::{EventBus, SosConfigurer};
use examind_sos::worker::{
    InsertObservation, RegisterSensor, SosVersion, SosWorker,
};

pub const SERVICE: &str = "default";
pub const SENSOR_3: &str = "urn:ogc:object:sensor:GEOM:3";
pub const SENSOR_8: &str = "urn:ogc:object:sensor:GEOM:8";
pub const OFFERING_3: &str = "offering-3";
pub const OFFERING_8: &str = "offering-8";
pub const DEPTH: &str = "urn:ogc:def:phenomenon:GEOM:depth";
pub const STATION: &str = "station-001";
pub const SENSORML: &str = "http://www.opengis.net/sensorML/1.0.1";

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

pub fn t(value: &str) -> NaiveDateTime {
    parse_time(value).unwrap()
}

pub fn station() -> FeatureOfInterest {
    FeatureOfInterest::point(STATION, 65400.0, 1731368.0)
}

pub fn depth() -> Phenomenon {
    Phenomenon::simple(DEPTH)
}

pub fn rows(values: &[(&str, f64)]) -> Vec<Sample> {
    values
        .iter()
        .map(|(time, v)| Sample::new(t(time), vec![(*v).into()]))
        .collect()
}

/// The 15 depth samples of sensor 3 on 2007-05-01: hourly 02:59 to 11:59 at
/// 6.56, then 17:59 to 21:59 at 6.55.
pub fn sensor_3_depths() -> Vec<Sample> {
    let hours = (2..=11).chain(17..=21);
    hours
        .map(|h| {
            let value = if h <= 11 { 6.56 } else { 6.55 };
            Sample::new(t(&format!("2007-05-01T{:02}:59:00", h)), vec![value.into()])
        })
        .collect()
}

/// Monthly depths of sensor 8 starting 2000-01-01.
pub fn sensor_8_depths() -> Vec<Sample> {
    rows(&[
        ("2000-01-01T00:00:00", 4.5),
        ("2000-02-01T00:00:00", 4.6),
        ("2000-03-01T00:00:00", 4.7),
        ("2000-04-01T00:00:00", 4.8),
    ])
}

pub fn observation(procedure: &str, result: Vec<Sample>) -> NewObservation {
    NewObservation {
        procedure: procedure.into(),
        feature_of_interest: station(),
        observed_property: depth(),
        sampling_time: None,
        result,
    }
}

pub fn register(worker: &SosWorker, procedure: &str) {
    worker
        .register_sensor(&RegisterSensor {
            version: SosVersion::V200,
            procedure_id: Some(procedure.to_string()),
            procedure_description_format: Some(SENSORML.to_string()),
            sensor_description: Some("<sml:SensorML/>".to_string()),
            observable_properties: vec![depth()],
            feature_of_interest: Some(station()),
            ..Default::default()
        })
        .unwrap();
}

pub fn insert(worker: &SosWorker, offering: &str, observation: NewObservation) {
    worker
        .insert_observation(&InsertObservation {
            version: SosVersion::V200,
            offerings: vec![offering.to_string()],
            observations: vec![observation],
            ..Default::default()
        })
        .unwrap();
}

/// Load sensors 3 and 8 with their depth series.
pub fn load_geom(worker: &SosWorker) {
    register(worker, SENSOR_3);
    insert(worker, OFFERING_3, observation(SENSOR_3, sensor_3_depths()));
    register(worker, SENSOR_8);
    insert(worker, OFFERING_8, observation(SENSOR_8, sensor_8_depths()));
}

pub fn config_store(raw: &str) -> Arc<InMemoryConfigStore> {
    let store = InMemoryConfigStore::new();
    store.insert_raw(SERVICE, raw);
    Arc::new(store)
}

/// A running worker over an empty store.
pub fn empty_worker() -> (SosWorker, LocalRepository) {
    let repo = LocalRepository::new();
    let worker = SosWorker::new(SERVICE, config_store(""), Arc::new(repo.clone()), EventBus::new());
    (worker, repo)
}

/// A running worker loaded with the GEOM data set.
pub fn geom_worker() -> (SosWorker, LocalRepository) {
    let (worker, repo) = empty_worker();
    load_geom(&worker);
    (worker, repo)
}

/// A configurer whose `default` service holds the GEOM data set.
pub fn geom_configurer() -> Arc<SosConfigurer> {
    let configurer = Arc::new(SosConfigurer::new(config_store("")));
    let worker = configurer.worker(SERVICE).unwrap();
    load_geom(&worker);
    configurer
}
