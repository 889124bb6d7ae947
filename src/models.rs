//! Domain model shared by the feeds, the cache and the orchestration layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// A single physical measurement. The unit is always explicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub value: f64,
    pub unit: String,
}

impl Observation {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    /// Zero-valued placeholder used when a feed column is missing
    pub fn zero(unit: impl Into<String>) -> Self {
        Self::new(0.0, unit)
    }
}

/// Latest buoy snapshot for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterConditions {
    pub location_id: String,
    pub timestamp: DateTime<Utc>,
    pub water_temperature: Observation,
    pub wave_height: Observation,
    pub wave_period: Observation,
    pub wave_direction: Observation,
    pub wind_speed: Observation,
    pub wind_direction: Observation,
}

/// One dated sample of a time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub date_time: DateTime<FixedOffset>,
    pub value: f64,
}

/// A named series from the time-series feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesReading {
    pub current: f64,
    pub unit: String,
    pub last_updated: DateTime<FixedOffset>,
    /// Oldest sample first
    pub history: Vec<Sample>,
}

impl SeriesReading {
    /// Change of the current value relative to an earlier reading
    pub fn delta_from(&self, previous: &SeriesReading) -> f64 {
        self.current - previous.current
    }
}

/// Temperature and discharge series from the time-series feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterData {
    pub temperature: SeriesReading,
    pub discharge: SeriesReading,
}

/// Named geographic region derived from station coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Northeast,
    Southeast,
    #[serde(rename = "Gulf Coast")]
    GulfCoast,
    #[serde(rename = "West Coast")]
    WestCoast,
    Hawaii,
    Alaska,
    #[serde(rename = "Great Lakes")]
    GreatLakes,
    Other,
}

impl Region {
    pub const ALL: [Region; 8] = [
        Region::Northeast,
        Region::Southeast,
        Region::GulfCoast,
        Region::WestCoast,
        Region::Hawaii,
        Region::Alaska,
        Region::GreatLakes,
        Region::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Northeast => "Northeast",
            Region::Southeast => "Southeast",
            Region::GulfCoast => "Gulf Coast",
            Region::WestCoast => "West Coast",
            Region::Hawaii => "Hawaii",
            Region::Alaska => "Alaska",
            Region::GreatLakes => "Great Lakes",
            Region::Other => "Other",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = std::convert::Infallible;

    /// Unknown names map to `Other`, so stored values never fail to load
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Region::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or(Region::Other))
    }
}

/// A user-tracked point of interest bound to one buoy station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
    pub region: Region,
    pub latitude: f64,
    pub longitude: f64,
    pub ndbc_station_id: String,
    pub is_favorite: bool,
    pub user_groups: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl Location {
    /// Creates a new location for a station picked from the station list
    pub fn from_station(station: &NdbcStation) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: station.name.clone(),
            region: station.region,
            latitude: station.latitude,
            longitude: station.longitude,
            ndbc_station_id: station.id.clone(),
            is_favorite: false,
            user_groups: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationGroup {
    pub id: String,
    pub name: String,
    pub location_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocationGroup {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            location_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A buoy station from the station list feed. Never persisted.
///
/// The capability flags are optimistic: the station list does not say which
/// variables a station reports, so both are always `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NdbcStation {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub region: Region,
    pub has_water_temperature: bool,
    pub has_wave_height: bool,
}
