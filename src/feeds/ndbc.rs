//! Buoy network feed: station list and realtime per-station observations
//!
//! Both documents are plain text with two header lines followed by
//! whitespace-delimited rows. Observation rows are most recent first and use
//! a fixed positional layout:
//!
//! ```text
//! YY MM DD hh mm WDIR WSPD GST WVHT DPD APD MWD PRES ATMP WTMP DEWP VIS PTDY TIDE
//! 0  1  2  3  4  5    6    7   8    9   10  11  12   13   14   15   16  17   18
//! ```
//!
//! Missing values are reported upstream as `MM`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info};

use super::fetcher::{FeedError, Fetcher};
use super::retry::{with_retry, RetryPolicy};
use crate::config::models::NdbcFeedConfig;
use crate::constants::feeds::{
    NDBC_HEADER_LINES, NDBC_OBSERVATION_MIN_FIELDS, NDBC_STATION_MIN_FIELDS,
};
use crate::metrics::DatasourceMetrics;
use crate::models::{NdbcStation, Observation, Region, WaterConditions};
use crate::normalize::classify_region;

const FEED_NAME: &str = "ndbc";

const COL_YEAR: usize = 0;
const COL_MONTH: usize = 1;
const COL_DAY: usize = 2;
const COL_HOUR: usize = 3;
const COL_MINUTE: usize = 4;
const COL_WIND_DIRECTION: usize = 5;
const COL_WIND_SPEED: usize = 6;
const COL_WAVE_HEIGHT: usize = 8;
const COL_WAVE_PERIOD: usize = 9;
const COL_WAVE_DIRECTION: usize = 11;
const COL_WATER_TEMPERATURE: usize = 14;

pub const UNIT_TEMPERATURE: &str = "degC";
pub const UNIT_WAVE_HEIGHT: &str = "m";
pub const UNIT_WAVE_PERIOD: &str = "s";
pub const UNIT_DIRECTION: &str = "deg";
pub const UNIT_WIND_SPEED: &str = "m/s";

/// Most recent row of a station's realtime file. Columns that did not parse
/// as numbers are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct BuoyReading {
    pub station_id: String,
    pub timestamp: DateTime<Utc>,
    pub water_temperature: Option<Observation>,
    pub wave_height: Option<Observation>,
    pub wave_period: Option<Observation>,
    pub wave_direction: Option<Observation>,
    pub wind_speed: Option<Observation>,
    pub wind_direction: Option<Observation>,
}

impl BuoyReading {
    /// Builds a conditions snapshot for a location, substituting zero-valued
    /// observations for absent columns.
    pub fn into_conditions(self, location_id: impl Into<String>) -> WaterConditions {
        WaterConditions {
            location_id: location_id.into(),
            timestamp: self.timestamp,
            water_temperature: self
                .water_temperature
                .unwrap_or_else(|| Observation::zero(UNIT_TEMPERATURE)),
            wave_height: self
                .wave_height
                .unwrap_or_else(|| Observation::zero(UNIT_WAVE_HEIGHT)),
            wave_period: self
                .wave_period
                .unwrap_or_else(|| Observation::zero(UNIT_WAVE_PERIOD)),
            wave_direction: self
                .wave_direction
                .unwrap_or_else(|| Observation::zero(UNIT_DIRECTION)),
            wind_speed: self
                .wind_speed
                .unwrap_or_else(|| Observation::zero(UNIT_WIND_SPEED)),
            wind_direction: self
                .wind_direction
                .unwrap_or_else(|| Observation::zero(UNIT_DIRECTION)),
        }
    }
}

/// Data rows of a buoy document: header lines skipped, blank lines dropped,
/// each row split on runs of whitespace.
fn data_rows(text: &str) -> impl Iterator<Item = Vec<&str>> {
    text.lines()
        .skip(NDBC_HEADER_LINES)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split_whitespace().collect())
}

/// Parses the station list. Rows with fewer than five fields or
/// non-numeric coordinates are skipped.
pub fn parse_station_list(text: &str) -> Vec<NdbcStation> {
    let stations: Vec<NdbcStation> = data_rows(text)
        .filter(|parts| parts.len() >= NDBC_STATION_MIN_FIELDS)
        .filter_map(|parts| {
            let latitude = parts[1].parse::<f64>().ok()?;
            let longitude = parts[2].parse::<f64>().ok()?;
            let name = parts[3..].join(" ").replace('"', "");

            Some(NdbcStation {
                id: parts[0].to_string(),
                name,
                latitude,
                longitude,
                region: classify_region(latitude, longitude),
                has_water_temperature: true,
                has_wave_height: true,
            })
        })
        .collect();

    debug!("Parsed {} stations from station list", stations.len());
    stations
}

fn numeric_column(parts: &[&str], index: usize) -> Option<f64> {
    parts
        .get(index)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|value| !value.is_nan())
}

fn observation(parts: &[&str], index: usize, unit: &str) -> Option<Observation> {
    numeric_column(parts, index).map(|value| Observation::new(value, unit))
}

fn integer_column(parts: &[&str], index: usize, name: &str) -> Result<u32, FeedError> {
    parts[index]
        .parse::<u32>()
        .map_err(|_| FeedError::InvalidFormat(format!("Invalid {name} '{}'", parts[index])))
}

fn row_timestamp(parts: &[&str]) -> Result<DateTime<Utc>, FeedError> {
    let mut year = integer_column(parts, COL_YEAR, "year")? as i32;
    if year < 100 {
        year += 2000;
    }
    let month = integer_column(parts, COL_MONTH, "month")?;
    let day = integer_column(parts, COL_DAY, "day")?;
    let hour = integer_column(parts, COL_HOUR, "hour")?;
    let minute = integer_column(parts, COL_MINUTE, "minute")?;

    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .ok_or_else(|| {
            FeedError::InvalidFormat(format!(
                "Invalid observation time {year}-{month}-{day} {hour}:{minute}"
            ))
        })
}

/// Parses the most recent observation row of a station's realtime file.
///
/// Only the first row with at least ten fields is read. Fails when no such
/// row exists or its date columns are invalid.
pub fn parse_observation(text: &str, station_id: &str) -> Result<BuoyReading, FeedError> {
    let parts = data_rows(text)
        .find(|parts| parts.len() >= NDBC_OBSERVATION_MIN_FIELDS)
        .ok_or_else(|| {
            FeedError::InvalidFormat(format!(
                "No observation row with at least {NDBC_OBSERVATION_MIN_FIELDS} fields for station {station_id}"
            ))
        })?;

    Ok(BuoyReading {
        station_id: station_id.to_string(),
        timestamp: row_timestamp(&parts)?,
        wave_height: observation(&parts, COL_WAVE_HEIGHT, UNIT_WAVE_HEIGHT),
        wave_period: observation(&parts, COL_WAVE_PERIOD, UNIT_WAVE_PERIOD),
        wave_direction: observation(&parts, COL_WAVE_DIRECTION, UNIT_DIRECTION),
        water_temperature: observation(&parts, COL_WATER_TEMPERATURE, UNIT_TEMPERATURE),
        wind_direction: observation(&parts, COL_WIND_DIRECTION, UNIT_DIRECTION),
        wind_speed: observation(&parts, COL_WIND_SPEED, UNIT_WIND_SPEED),
    })
}

/// Station picker filter: case-insensitive substring match on name or id,
/// optionally restricted to one region.
pub fn filter_stations<'a>(
    stations: &'a [NdbcStation],
    query: Option<&str>,
    region: Option<Region>,
) -> Vec<&'a NdbcStation> {
    let query = query
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    stations
        .iter()
        .filter(|station| match &query {
            Some(q) => {
                station.name.to_lowercase().contains(q) || station.id.to_lowercase().contains(q)
            }
            None => true,
        })
        .filter(|station| region.map_or(true, |r| station.region == r))
        .collect()
}

/// Client for the buoy network feed
pub struct NdbcClient {
    fetcher: Arc<Fetcher>,
    base_url: String,
    stations_url: String,
    retry: RetryPolicy,
}

impl NdbcClient {
    pub fn new(config: &NdbcFeedConfig, fetcher: Arc<Fetcher>) -> Self {
        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Self {
            fetcher,
            base_url,
            stations_url: config.stations_url.clone(),
            retry: config.retry_policy(),
        }
    }

    /// Creates a client with its own HTTP client using the configured timeout
    pub fn from_config(config: &NdbcFeedConfig) -> Result<Self, FeedError> {
        let fetcher = Fetcher::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetches and parses the full station list
    pub async fn fetch_station_list(&self) -> Result<Vec<NdbcStation>, FeedError> {
        let text = with_retry(&self.retry, FEED_NAME, || {
            self.fetcher.fetch_text(&self.stations_url, FEED_NAME)
        })
        .await?;

        let stations = parse_station_list(&text);
        info!("Fetched {} buoy stations", stations.len());
        Ok(stations)
    }

    /// Fetches the latest observation row for a station
    pub async fn fetch_reading(&self, station_id: &str) -> Result<BuoyReading, FeedError> {
        let url = format!("{}{}.txt", self.base_url, station_id);
        let text = with_retry(&self.retry, FEED_NAME, || {
            self.fetcher.fetch_text(&url, FEED_NAME)
        })
        .await?;

        parse_observation(&text, station_id).map_err(|e| {
            DatasourceMetrics::record_parse_error(FEED_NAME, e.kind());
            e
        })
    }

    /// Fetches a conditions snapshot for `location_id` from its station
    pub async fn fetch_water_conditions(
        &self,
        location_id: &str,
        station_id: &str,
    ) -> Result<WaterConditions, FeedError> {
        let reading = self.fetch_reading(station_id).await?;
        debug!(
            "Station {} reported at {} for location {}",
            station_id, reading.timestamp, location_id
        );
        Ok(reading.into_conditions(location_id))
    }
}
