use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{CacheStore, StorageError};
use crate::error_context::blob;
use crate::models::{Location, LocationGroup, WaterConditions, WaterData};

const KEY_WATER_DATA: &str = "waterData";
const KEY_LOCATIONS: &str = "locations";
const KEY_LOCATION_GROUPS: &str = "locationGroups";
const KEY_WATER_CONDITIONS: &str = "waterConditions";

/// Flat key-value cache: one JSON document per key in a directory.
///
/// Every write rewrites the whole blob. Writes go through a temporary file
/// and a rename, but there is no cross-key atomicity.
pub struct KeyValueStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl KeyValueStore {
    pub async fn open(dir: &Path) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(StorageError::io(format!(
                "Failed to create directory {}",
                dir.display()
            )))?;

        info!("Opened key-value cache at {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    async fn read_blob<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match tokio::fs::read(self.blob_path(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io {
                context: blob::read(key),
                source: e,
            }),
        }
    }

    async fn write_blob<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(value)?;
        let final_path = self.blob_path(key);
        let temp_path = self.dir.join(format!("{key}.json.tmp"));

        tokio::fs::write(&temp_path, bytes)
            .await
            .map_err(StorageError::io(blob::write(key)))?;
        tokio::fs::rename(&temp_path, &final_path)
            .await
            .map_err(StorageError::io(blob::write(key)))?;

        debug!("Wrote {} blob", key);
        Ok(())
    }

    async fn locations(&self) -> Result<Vec<Location>, StorageError> {
        Ok(self.read_blob(KEY_LOCATIONS).await?.unwrap_or_default())
    }

    async fn groups(&self) -> Result<Vec<LocationGroup>, StorageError> {
        Ok(self.read_blob(KEY_LOCATION_GROUPS).await?.unwrap_or_default())
    }

    async fn conditions(&self) -> Result<HashMap<String, WaterConditions>, StorageError> {
        Ok(self.read_blob(KEY_WATER_CONDITIONS).await?.unwrap_or_default())
    }
}

/// Replaces `user_groups` with the ids of the groups listing the location
fn with_memberships(mut location: Location, groups: &[LocationGroup]) -> Location {
    location.user_groups = groups
        .iter()
        .filter(|g| g.location_ids.contains(&location.id))
        .map(|g| g.id.clone())
        .collect();
    location
}

fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(id.clone());
        }
    }
    seen
}

#[async_trait]
impl CacheStore for KeyValueStore {
    async fn save_data(&self, data: &WaterData) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        self.write_blob(KEY_WATER_DATA, data).await
    }

    async fn get_latest_data(&self) -> Result<WaterData, StorageError> {
        let _guard = self.lock.lock().await;
        self.read_blob(KEY_WATER_DATA)
            .await?
            .ok_or(StorageError::NoData)
    }

    async fn save_location(&self, location: &Location) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut locations = self.locations().await?;

        let mut stored = location.clone();
        stored.user_groups.clear();

        match locations.iter_mut().find(|l| l.id == location.id) {
            Some(existing) => *existing = stored,
            None => locations.push(stored),
        }
        self.write_blob(KEY_LOCATIONS, &locations).await
    }

    async fn get_locations(&self) -> Result<Vec<Location>, StorageError> {
        let _guard = self.lock.lock().await;
        let groups = self.groups().await?;
        Ok(self
            .locations()
            .await?
            .into_iter()
            .map(|l| with_memberships(l, &groups))
            .collect())
    }

    async fn get_location(&self, id: &str) -> Result<Option<Location>, StorageError> {
        let _guard = self.lock.lock().await;
        let groups = self.groups().await?;
        Ok(self
            .locations()
            .await?
            .into_iter()
            .find(|l| l.id == id)
            .map(|l| with_memberships(l, &groups)))
    }

    async fn delete_location(&self, id: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;

        let mut locations = self.locations().await?;
        locations.retain(|l| l.id != id);
        self.write_blob(KEY_LOCATIONS, &locations).await?;

        let mut groups = self.groups().await?;
        for group in groups.iter_mut() {
            group.location_ids.retain(|l| l != id);
        }
        self.write_blob(KEY_LOCATION_GROUPS, &groups).await?;

        let mut conditions = self.conditions().await?;
        if conditions.remove(id).is_some() {
            self.write_blob(KEY_WATER_CONDITIONS, &conditions).await?;
        }
        Ok(())
    }

    async fn save_location_group(&self, group: &LocationGroup) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut groups = self.groups().await?;

        let mut stored = group.clone();
        stored.location_ids = dedup_ids(&group.location_ids);

        match groups.iter_mut().find(|g| g.id == group.id) {
            Some(existing) => *existing = stored,
            None => groups.push(stored),
        }
        self.write_blob(KEY_LOCATION_GROUPS, &groups).await
    }

    async fn get_location_groups(&self) -> Result<Vec<LocationGroup>, StorageError> {
        let _guard = self.lock.lock().await;
        self.groups().await
    }

    async fn get_location_group(&self, id: &str) -> Result<Option<LocationGroup>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.groups().await?.into_iter().find(|g| g.id == id))
    }

    async fn delete_location_group(&self, id: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut groups = self.groups().await?;
        groups.retain(|g| g.id != id);
        self.write_blob(KEY_LOCATION_GROUPS, &groups).await
    }

    async fn save_water_conditions(
        &self,
        conditions: &WaterConditions,
    ) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut all = self.conditions().await?;

        let is_newer = all
            .get(&conditions.location_id)
            .map_or(true, |existing| existing.timestamp <= conditions.timestamp);
        if !is_newer {
            debug!(
                "Keeping newer conditions for {}; incoming snapshot is older",
                conditions.location_id
            );
            return Ok(());
        }

        all.insert(conditions.location_id.clone(), conditions.clone());
        self.write_blob(KEY_WATER_CONDITIONS, &all).await
    }

    async fn get_water_conditions(
        &self,
        location_id: &str,
    ) -> Result<Option<WaterConditions>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.conditions().await?.remove(location_id))
    }

    async fn get_all_water_conditions(
        &self,
    ) -> Result<HashMap<String, WaterConditions>, StorageError> {
        let _guard = self.lock.lock().await;
        self.conditions().await
    }

    fn backend_name(&self) -> &'static str {
        "key_value"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blobs_use_flat_key_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyValueStore::open(dir.path()).await.unwrap();

        store
            .save_location_group(&LocationGroup::new("Surf spots"))
            .await
            .unwrap();

        assert!(dir.path().join("locationGroups.json").exists());
        assert!(!dir.path().join("locationGroups.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("waterData.json"), b"{not json").unwrap();
        let store = KeyValueStore::open(dir.path()).await.unwrap();

        assert!(matches!(
            store.get_latest_data().await,
            Err(StorageError::Serialization(_))
        ));
    }
}
