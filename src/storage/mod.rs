//! Local cache of feed readings and user-managed locations
//!
//! Two backing stores implement [`CacheStore`] with the same observable
//! behaviour: a SQLite database and a directory of JSON blobs. Callers go
//! through [`Cache`], which makes writes best-effort and keeps reads strict.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::models::{StorageBackend, StorageConfig};
use crate::metrics::CacheMetrics;
use crate::models::{Location, LocationGroup, WaterConditions, WaterData};

pub mod kv;
pub mod models;
pub mod sqlite;
#[cfg(test)]
mod tests;

pub use kv::KeyValueStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No data available")]
    NoData,

    #[error("{context}: {source}")]
    Database {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to run database migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stored value: {0}")]
    InvalidRow(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn database(context: impl Into<String>) -> impl FnOnce(sqlx::Error) -> Self {
        let context = context.into();
        move |source| StorageError::Database { context, source }
    }

    pub fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| StorageError::Io { context, source }
    }
}

/// Persistence operations shared by both backing stores.
///
/// Single-entity reads return `None` when the entity does not exist and
/// collection reads may be empty; only the global latest-data slot reports
/// [`StorageError::NoData`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Appends the latest time-series reading to the global slot
    async fn save_data(&self, data: &WaterData) -> Result<(), StorageError>;
    async fn get_latest_data(&self) -> Result<WaterData, StorageError>;

    /// Upserts by id. `user_groups` is derived from group membership and
    /// ignored on write.
    async fn save_location(&self, location: &Location) -> Result<(), StorageError>;
    async fn get_locations(&self) -> Result<Vec<Location>, StorageError>;
    async fn get_location(&self, id: &str) -> Result<Option<Location>, StorageError>;
    /// Removes the location, its group memberships and its conditions
    async fn delete_location(&self, id: &str) -> Result<(), StorageError>;

    /// Upserts by id and replaces the full membership list
    async fn save_location_group(&self, group: &LocationGroup) -> Result<(), StorageError>;
    async fn get_location_groups(&self) -> Result<Vec<LocationGroup>, StorageError>;
    async fn get_location_group(&self, id: &str) -> Result<Option<LocationGroup>, StorageError>;
    async fn delete_location_group(&self, id: &str) -> Result<(), StorageError>;

    async fn save_water_conditions(&self, conditions: &WaterConditions)
        -> Result<(), StorageError>;
    /// Newest snapshot by timestamp for the location
    async fn get_water_conditions(
        &self,
        location_id: &str,
    ) -> Result<Option<WaterConditions>, StorageError>;
    /// Newest snapshot by timestamp for every location that has one
    async fn get_all_water_conditions(
        &self,
    ) -> Result<HashMap<String, WaterConditions>, StorageError>;

    fn backend_name(&self) -> &'static str;
}

/// Opens the backing store selected in the configuration
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn CacheStore>, StorageError> {
    let path = config.resolved_path();
    info!("Opening {:?} cache at {}", config.backend, path.display());

    let store: Arc<dyn CacheStore> = match config.backend {
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(&path).await?),
        StorageBackend::KeyValue => Arc::new(KeyValueStore::open(&path).await?),
    };
    Ok(store)
}

/// Cache facade used by the orchestration layer.
///
/// Write failures are logged and swallowed; read failures are returned.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    fn write_outcome(&self, operation: &str, result: Result<(), StorageError>) {
        match result {
            Ok(()) => {
                CacheMetrics::record_operation(operation, true);
                debug!("{} cache write {} succeeded", self.store.backend_name(), operation);
            }
            Err(e) => {
                CacheMetrics::record_operation(operation, false);
                error!(
                    "{} cache write {} failed: {}",
                    self.store.backend_name(),
                    operation,
                    e
                );
            }
        }
    }

    fn read_outcome<T>(
        &self,
        operation: &str,
        result: Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        CacheMetrics::record_operation(operation, result.is_ok());
        result
    }

    pub async fn save_data(&self, data: &WaterData) {
        let result = self.store.save_data(data).await;
        self.write_outcome("save_data", result);
    }

    pub async fn get_latest_data(&self) -> Result<WaterData, StorageError> {
        let result = self.store.get_latest_data().await;
        self.read_outcome("get_latest_data", result)
    }

    pub async fn save_location(&self, location: &Location) {
        let result = self.store.save_location(location).await;
        self.write_outcome("save_location", result);
    }

    pub async fn get_locations(&self) -> Result<Vec<Location>, StorageError> {
        let result = self.store.get_locations().await;
        self.read_outcome("get_locations", result)
    }

    pub async fn get_location(&self, id: &str) -> Result<Option<Location>, StorageError> {
        let result = self.store.get_location(id).await;
        self.read_outcome("get_location", result)
    }

    pub async fn delete_location(&self, id: &str) {
        let result = self.store.delete_location(id).await;
        self.write_outcome("delete_location", result);
    }

    pub async fn save_location_group(&self, group: &LocationGroup) {
        let result = self.store.save_location_group(group).await;
        self.write_outcome("save_location_group", result);
    }

    pub async fn get_location_groups(&self) -> Result<Vec<LocationGroup>, StorageError> {
        let result = self.store.get_location_groups().await;
        self.read_outcome("get_location_groups", result)
    }

    pub async fn get_location_group(
        &self,
        id: &str,
    ) -> Result<Option<LocationGroup>, StorageError> {
        let result = self.store.get_location_group(id).await;
        self.read_outcome("get_location_group", result)
    }

    pub async fn delete_location_group(&self, id: &str) {
        let result = self.store.delete_location_group(id).await;
        self.write_outcome("delete_location_group", result);
    }

    pub async fn save_water_conditions(&self, conditions: &WaterConditions) {
        let result = self.store.save_water_conditions(conditions).await;
        self.write_outcome("save_water_conditions", result);
    }

    pub async fn get_water_conditions(
        &self,
        location_id: &str,
    ) -> Result<Option<WaterConditions>, StorageError> {
        let result = self.store.get_water_conditions(location_id).await;
        self.read_outcome("get_water_conditions", result)
    }

    pub async fn get_all_water_conditions(
        &self,
    ) -> Result<HashMap<String, WaterConditions>, StorageError> {
        let result = self.store.get_all_water_conditions().await;
        self.read_outcome("get_all_water_conditions", result)
    }
}
