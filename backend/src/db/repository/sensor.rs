//! Sensor repository trait.
//!
//! Sensors (procedures) and the offering bindings that group them. Offering
//! contents other than the binding are derived from the series on every read.

use super::error::RepositoryResult;
use crate::models::{Offering, OfferingId, ProcedureId, Sensor};

/// Repository trait for sensor registration and offering bindings.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the worker shares one store across
/// request threads.
pub trait SensorRepository: Send + Sync {
    // ==================== Health & Connection ====================

    /// Check if the store is reachable.
    ///
    /// # Returns
    /// - `Ok(true)` if the store is healthy
    /// - `Ok(false)` if the store is unhealthy but no error occurred
    /// - `Err(RepositoryError)` if an error occurred during the check
    fn health_check(&self) -> RepositoryResult<bool>;

    // ==================== Sensor Operations ====================

    /// Register a sensor, replacing any sensor with the same id.
    ///
    /// # Returns
    /// * `Ok(true)` - An existing sensor was replaced
    /// * `Ok(false)` - The sensor is new
    fn insert_sensor(&self, sensor: Sensor) -> RepositoryResult<bool>;

    /// Look up a sensor by id.
    ///
    /// # Returns
    /// * `Ok(None)` - The sensor is not (or no longer) registered
    fn get_sensor(&self, id: &ProcedureId) -> RepositoryResult<Option<Sensor>>;

    /// All registered sensors ordered by id.
    fn list_sensors(&self) -> RepositoryResult<Vec<Sensor>>;

    /// Delete a sensor and cascade to its series, records, templates and
    /// offering bindings. Children are detached.
    ///
    /// # Returns
    /// * `Ok(true)` - The sensor existed
    /// * `Ok(false)` - Nothing to delete
    fn delete_sensor(&self, id: &ProcedureId) -> RepositoryResult<bool>;

    /// Hand out the next number for generated sensor ids.
    fn allocate_sensor_number(&self) -> RepositoryResult<u64>;

    // ==================== Offering Operations ====================

    /// Bind `procedure` to `offering`, creating the offering if needed.
    fn bind_offering(&self, offering: &OfferingId, procedure: &ProcedureId) -> RepositoryResult<()>;

    /// Offering view with its derived phenomena, features and time envelope.
    fn get_offering(&self, id: &OfferingId) -> RepositoryResult<Option<Offering>>;

    /// All offerings ordered by id.
    fn list_offerings(&self) -> RepositoryResult<Vec<Offering>>;

    /// Offerings a procedure is bound to.
    fn offerings_of(&self, procedure: &ProcedureId) -> RepositoryResult<Vec<OfferingId>>;
}
