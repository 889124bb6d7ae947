//! Upstream feed clients
//!
//! [`NdbcClient`] reads the buoy network's text files and [`UsgsClient`] the
//! time-series service's JSON. The orchestration layer depends on the
//! [`BuoyFeed`] and [`WaterDataFeed`] traits rather than on the clients.

use async_trait::async_trait;

use crate::models::{NdbcStation, WaterConditions, WaterData};

pub mod fetcher;
pub mod ndbc;
pub mod retry;
pub mod usgs;


pub use fetcher::{FeedError, Fetcher};
pub use ndbc::{filter_stations, parse_observation, parse_station_list, BuoyReading, NdbcClient};
pub use retry::{with_retry, RetryPolicy};
pub use usgs::{parse_water_data, parse_water_data_json, UsgsClient};

/// Source of station lists and per-station conditions
#[async_trait]
pub trait BuoyFeed: Send + Sync {
    async fn fetch_station_list(&self) -> Result<Vec<NdbcStation>, FeedError>;

    /// Conditions from `station_id`, keyed by `location_id`
    async fn fetch_water_conditions(
        &self,
        location_id: &str,
        station_id: &str,
    ) -> Result<WaterConditions, FeedError>;
}

/// Source of the temperature and discharge series
#[async_trait]
pub trait WaterDataFeed: Send + Sync {
    async fn fetch_water_data(&self) -> Result<WaterData, FeedError>;
}

#[async_trait]
impl BuoyFeed for NdbcClient {
    async fn fetch_station_list(&self) -> Result<Vec<NdbcStation>, FeedError> {
        NdbcClient::fetch_station_list(self).await
    }

    async fn fetch_water_conditions(
        &self,
        location_id: &str,
        station_id: &str,
    ) -> Result<WaterConditions, FeedError> {
        NdbcClient::fetch_water_conditions(self, location_id, station_id).await
    }
}

#[async_trait]
impl WaterDataFeed for UsgsClient {
    async fn fetch_water_data(&self) -> Result<WaterData, FeedError> {
        UsgsClient::fetch_water_data(self).await
    }
}
