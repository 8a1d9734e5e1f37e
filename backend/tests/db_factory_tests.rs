//! Tests for db::factory module - repository creation and configuration.

mod support;

use std::str::FromStr;

use examind_sos::db::factory::{RepositoryFactory, RepositoryType};

#[test]
fn test_repository_type_from_str_local() {
    assert_eq!(RepositoryType::from_str("local").unwrap(), RepositoryType::Local);
    assert_eq!(RepositoryType::from_str("LOCAL").unwrap(), RepositoryType::Local);
    assert_eq!(RepositoryType::from_str("in-memory").unwrap(), RepositoryType::Local);
}

#[test]
fn test_repository_type_from_str_invalid() {
    let result = RepositoryType::from_str("invalid");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Unknown repository type"));
}

#[test]
fn test_repository_type_from_env_default() {
    support::with_scoped_env(&[("SOS_REPOSITORY_TYPE", None)], || {
        assert_eq!(RepositoryType::from_env().unwrap(), RepositoryType::Local);
    });
}

#[test]
fn test_repository_type_from_env_explicit() {
    support::with_scoped_env(&[("SOS_REPOSITORY_TYPE", Some("memory"))], || {
        assert_eq!(RepositoryType::from_env().unwrap(), RepositoryType::Local);
    });
}

#[test]
fn test_repository_factory_from_env_rejects_unknown_backend() {
    support::with_scoped_env(&[("SOS_REPOSITORY_TYPE", Some("cassandra"))], || {
        let err = RepositoryFactory::from_env().err().unwrap();
        assert!(err.to_string().contains("Invalid repository type"));
    });
}

#[test]
fn test_factory_creates_independent_stores() {
    let a = RepositoryFactory::create(RepositoryType::Local).unwrap();
    let b = RepositoryFactory::create(RepositoryType::Local).unwrap();
    a.allocate_sensor_number().unwrap();
    assert_eq!(a.allocate_sensor_number().unwrap(), 2);
    assert_eq!(b.allocate_sensor_number().unwrap(), 1);
}

#[test]
fn test_repository_type_serde() {
    let json = serde_json::to_string(&RepositoryType::Local).unwrap();
    assert_eq!(json, "\"local\"");
    let parsed: RepositoryType = serde_json::from_str("\"local\"").unwrap();
    assert_eq!(parsed, RepositoryType::Local);
}
