//! SOS service configuration.
//!
//! Each service instance is configured by one TOML document stored under its
//! service id. Every setting has a default, so an empty document is a valid
//! configuration:
//!
//! ```toml
//! max_observations_by_request = 50000
//!
//! [service]
//! title = "Constellation SOS"
//!
//! [repository]
//! type = "local"
//! ```

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::db::RepositoryType;

/// Errors raised while loading or storing a service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Malformed(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Service identification advertised by GetCapabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceIdentification {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Default for ServiceIdentification {
    fn default() -> Self {
        Self {
            title: default_title(),
            abstract_text: String::new(),
            keywords: Vec::new(),
        }
    }
}

/// Service provider advertised by GetCapabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceProvider {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub site: String,
}

/// Storage backend settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySettings {
    #[serde(default, rename = "type")]
    pub repo_type: RepositoryType,
}

/// Configuration of one SOS service instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosConfiguration {
    #[serde(default = "default_supported_versions")]
    pub supported_versions: Vec<String>,
    #[serde(default = "default_sensor_id_base")]
    pub sensor_id_base: String,
    #[serde(default = "default_template_id_base")]
    pub observation_template_id_base: String,
    #[serde(default = "default_observation_id_base")]
    pub observation_id_base: String,
    #[serde(default = "default_phenomenon_id_base")]
    pub phenomenon_id_base: String,
    /// Upper bound on observations returned by one GetObservation; `None` is unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_observations_by_request: Option<usize>,
    #[serde(default = "default_decimation_width")]
    pub default_decimation_width: usize,
    // tables last so the document serializes
    #[serde(default)]
    pub service: ServiceIdentification,
    #[serde(default)]
    pub provider: ServiceProvider,
    #[serde(default)]
    pub repository: RepositorySettings,
}

fn default_title() -> String {
    "Examind SOS".to_string()
}

fn default_supported_versions() -> Vec<String> {
    vec!["1.0.0".to_string(), "2.0.0".to_string()]
}

fn default_sensor_id_base() -> String {
    "urn:ogc:object:sensor:GEOM:".to_string()
}

fn default_template_id_base() -> String {
    "urn:ogc:object:observation:template:GEOM:".to_string()
}

fn default_observation_id_base() -> String {
    "urn:ogc:object:observation:GEOM:".to_string()
}

fn default_phenomenon_id_base() -> String {
    "urn:ogc:def:phenomenon:GEOM:".to_string()
}

fn default_decimation_width() -> usize {
    1000
}

impl Default for SosConfiguration {
    fn default() -> Self {
        Self {
            service: ServiceIdentification::default(),
            provider: ServiceProvider::default(),
            supported_versions: default_supported_versions(),
            sensor_id_base: default_sensor_id_base(),
            observation_template_id_base: default_template_id_base(),
            observation_id_base: default_observation_id_base(),
            phenomenon_id_base: default_phenomenon_id_base(),
            max_observations_by_request: None,
            default_decimation_width: default_decimation_width(),
            repository: RepositorySettings::default(),
        }
    }
}

impl SosConfiguration {
    /// Parse and validate a TOML document.
    ///
    /// # Returns
    /// * `Err(ConfigError::Malformed)` - The document does not parse
    /// * `Err(ConfigError::Invalid)` - It parses but a setting is unusable
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SosConfiguration =
            toml::from_str(raw).map_err(|e| ConfigError::Malformed(e.to_string().trim().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check settings serde cannot enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.supported_versions.is_empty() {
            return Err(ConfigError::Invalid("no supported version".to_string()));
        }
        if let Some(v) = self
            .supported_versions
            .iter()
            .find(|v| v.as_str() != "1.0.0" && v.as_str() != "2.0.0")
        {
            return Err(ConfigError::Invalid(format!("unsupported version '{}'", v)));
        }
        for (name, base) in [
            ("sensor_id_base", &self.sensor_id_base),
            ("observation_template_id_base", &self.observation_template_id_base),
            ("observation_id_base", &self.observation_id_base),
        ] {
            if base.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
            }
        }
        if self.max_observations_by_request == Some(0) {
            return Err(ConfigError::Invalid(
                "max_observations_by_request must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn supports_version(&self, version: &str) -> bool {
        self.supported_versions.iter().any(|v| v == version)
    }
}

/// Persisted service configurations, keyed by service id.
pub trait ServiceConfigStore: Send + Sync {
    /// Raw document of a service, `None` when the service has none.
    fn load_raw(&self, service_id: &str) -> Result<Option<String>, ConfigError>;

    /// Store a configuration, replacing any previous one.
    fn save(&self, service_id: &str, config: &SosConfiguration) -> Result<(), ConfigError>;

    /// Ids of every configured service, sorted.
    fn list_services(&self) -> Result<Vec<String>, ConfigError>;

    /// Parsed configuration of a service.
    fn load(&self, service_id: &str) -> Result<Option<SosConfiguration>, ConfigError> {
        self.load_raw(service_id)?
            .map(|raw| SosConfiguration::from_toml_str(&raw))
            .transpose()
    }
}

/// Configuration store held in memory.
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    documents: Arc<RwLock<BTreeMap<String, String>>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw document without validating it.
    pub fn insert_raw(&self, service_id: impl Into<String>, raw: impl Into<String>) {
        self.documents.write().insert(service_id.into(), raw.into());
    }

    pub fn remove(&self, service_id: &str) -> bool {
        self.documents.write().remove(service_id).is_some()
    }
}

impl ServiceConfigStore for InMemoryConfigStore {
    fn load_raw(&self, service_id: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.documents.read().get(service_id).cloned())
    }

    fn save(&self, service_id: &str, config: &SosConfiguration) -> Result<(), ConfigError> {
        let raw = config.to_toml_string()?;
        self.insert_raw(service_id, raw);
        Ok(())
    }

    fn list_services(&self) -> Result<Vec<String>, ConfigError> {
        Ok(self.documents.read().keys().cloned().collect())
    }
}

/// Configuration store keeping one `<service-id>.toml` per service in a directory.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    dir: PathBuf,
}

impl FileConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, service_id: &str) -> Result<PathBuf, ConfigError> {
        if service_id.is_empty()
            || service_id.contains(['/', '\\'])
            || service_id.starts_with('.')
        {
            return Err(ConfigError::Invalid(format!("invalid service id '{}'", service_id)));
        }
        Ok(self.dir.join(format!("{}.toml", service_id)))
    }
}

impl ServiceConfigStore for FileConfigStore {
    fn load_raw(&self, service_id: &str) -> Result<Option<String>, ConfigError> {
        let path = self.path_for(service_id)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    fn save(&self, service_id: &str, config: &SosConfiguration) -> Result<(), ConfigError> {
        let path = self.path_for(service_id)?;
        fs::create_dir_all(&self.dir).map_err(|source| ConfigError::Io {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, config.to_toml_string()?).map_err(|source| ConfigError::Io { path, source })
    }

    fn list_services(&self) -> Result<Vec<String>, ConfigError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };
        let mut ids: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        ids.sort();
        Ok(ids)
    }
}
