use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::WaterwatchError;
use crate::feeds::{filter_stations, BuoyFeed};
use crate::metrics::CacheMetrics;
use crate::models::{Location, LocationGroup, NdbcStation, Region, WaterConditions};
use crate::storage::Cache;

/// Location list, detail and group management
pub struct LocationService {
    feed: Arc<dyn BuoyFeed>,
    cache: Cache,
}

impl LocationService {
    pub fn new(feed: Arc<dyn BuoyFeed>, cache: Cache) -> Self {
        Self { feed, cache }
    }

    /// Station list filtered by a search string and an optional region
    pub async fn search_stations(
        &self,
        query: Option<&str>,
        region: Option<Region>,
    ) -> Result<Vec<NdbcStation>, WaterwatchError> {
        let stations = self.feed.fetch_station_list().await?;
        Ok(filter_stations(&stations, query, region)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Starts tracking a station as a new location
    pub async fn add_location(&self, station: &NdbcStation) -> Location {
        let location = Location::from_station(station);
        self.cache.save_location(&location).await;
        info!(
            "{} has been added to your locations ({})",
            location.name, location.id
        );
        location
    }

    /// Looks the station up in the station list and adds it
    pub async fn add_station(&self, station_id: &str) -> Result<Location, WaterwatchError> {
        let stations = self.feed.fetch_station_list().await?;
        let station = stations
            .iter()
            .find(|s| s.id.eq_ignore_ascii_case(station_id))
            .ok_or_else(|| WaterwatchError::not_found("Station", station_id))?;

        Ok(self.add_location(station).await)
    }

    pub async fn locations(&self) -> Result<Vec<Location>, WaterwatchError> {
        Ok(self.cache.get_locations().await?)
    }

    pub async fn location(&self, id: &str) -> Result<Location, WaterwatchError> {
        self.cache
            .get_location(id)
            .await?
            .ok_or_else(|| WaterwatchError::not_found("Location", id))
    }

    pub async fn toggle_favorite(&self, id: &str) -> Result<Location, WaterwatchError> {
        let mut location = self.location(id).await?;
        location.is_favorite = !location.is_favorite;
        self.cache.save_location(&location).await;
        Ok(location)
    }

    /// Deletes the location together with its memberships and conditions
    pub async fn delete_location(&self, id: &str) -> Result<(), WaterwatchError> {
        let location = self.location(id).await?;
        self.cache.delete_location(&location.id).await;
        info!("Deleted location {} ({})", location.name, location.id);
        Ok(())
    }

    /// Cached conditions for the location, fetched and cached on a miss
    pub async fn conditions_for(&self, id: &str) -> Result<WaterConditions, WaterwatchError> {
        let location = self.location(id).await?;

        if let Some(cached) = self.cache.get_water_conditions(&location.id).await? {
            debug!("Using cached conditions for {}", location.id);
            return Ok(cached);
        }

        CacheMetrics::record_fallback("conditions_miss");
        let conditions = self
            .feed
            .fetch_water_conditions(&location.id, &location.ndbc_station_id)
            .await?;
        self.cache.save_water_conditions(&conditions).await;
        Ok(conditions)
    }

    /// Fetches fresh conditions for the location and caches them
    pub async fn refresh_conditions(&self, id: &str) -> Result<WaterConditions, WaterwatchError> {
        let location = self.location(id).await?;
        let conditions = self
            .feed
            .fetch_water_conditions(&location.id, &location.ndbc_station_id)
            .await?;
        self.cache.save_water_conditions(&conditions).await;
        Ok(conditions)
    }

    /// Cached conditions for every location. On a cold cache with tracked
    /// locations, fetches all of them; failures are logged and skipped.
    pub async fn all_conditions(
        &self,
    ) -> Result<HashMap<String, WaterConditions>, WaterwatchError> {
        let cached = self.cache.get_all_water_conditions().await?;
        if !cached.is_empty() {
            return Ok(cached);
        }

        let locations = self.cache.get_locations().await?;
        if locations.is_empty() {
            return Ok(cached);
        }

        info!(
            "No cached conditions, fetching {} locations",
            locations.len()
        );
        let results = join_all(locations.iter().map(|location| async move {
            let result = self
                .feed
                .fetch_water_conditions(&location.id, &location.ndbc_station_id)
                .await;
            (location, result)
        }))
        .await;

        let mut fetched = HashMap::new();
        for (location, result) in results {
            match result {
                Ok(conditions) => {
                    self.cache.save_water_conditions(&conditions).await;
                    fetched.insert(location.id.clone(), conditions);
                }
                Err(e) => error!("Error fetching conditions for {}: {}", location.name, e),
            }
        }
        Ok(fetched)
    }

    pub async fn groups(&self) -> Result<Vec<LocationGroup>, WaterwatchError> {
        Ok(self.cache.get_location_groups().await?)
    }

    pub async fn group(&self, id: &str) -> Result<LocationGroup, WaterwatchError> {
        self.cache
            .get_location_group(id)
            .await?
            .ok_or_else(|| WaterwatchError::not_found("Group", id))
    }

    pub async fn create_group(&self, name: &str) -> LocationGroup {
        let group = LocationGroup::new(name);
        self.cache.save_location_group(&group).await;
        group
    }

    pub async fn add_to_group(
        &self,
        group_id: &str,
        location_id: &str,
    ) -> Result<LocationGroup, WaterwatchError> {
        let mut group = self.group(group_id).await?;
        let location = self.location(location_id).await?;

        if !group.location_ids.contains(&location.id) {
            group.location_ids.push(location.id);
            group.updated_at = Utc::now();
            self.cache.save_location_group(&group).await;
        }
        Ok(group)
    }

    pub async fn remove_from_group(
        &self,
        group_id: &str,
        location_id: &str,
    ) -> Result<LocationGroup, WaterwatchError> {
        let mut group = self.group(group_id).await?;

        let before = group.location_ids.len();
        group.location_ids.retain(|id| id != location_id);
        if group.location_ids.len() != before {
            group.updated_at = Utc::now();
            self.cache.save_location_group(&group).await;
        }
        Ok(group)
    }

    pub async fn delete_group(&self, id: &str) -> Result<(), WaterwatchError> {
        let group = self.group(id).await?;
        self.cache.delete_location_group(&group.id).await;
        Ok(())
    }
}
