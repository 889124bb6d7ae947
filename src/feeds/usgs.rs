//! Time-series feed: water temperature and discharge series as JSON

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::fetcher::{FeedError, Fetcher};
use super::retry::{with_retry, RetryPolicy};
use crate::config::models::UsgsFeedConfig;
use crate::constants::feeds::{USGS_DISCHARGE_CODE, USGS_TEMPERATURE_CODE};
use crate::metrics::DatasourceMetrics;
use crate::models::{Sample, SeriesReading, WaterData};

const FEED_NAME: &str = "usgs";

/// Subset of the instantaneous-values response that is consumed
#[derive(Debug, Deserialize)]
pub struct UsgsResponse {
    pub value: UsgsValue,
}

#[derive(Debug, Deserialize)]
pub struct UsgsValue {
    #[serde(rename = "timeSeries", default)]
    pub time_series: Vec<TimeSeries>,
}

#[derive(Debug, Deserialize)]
pub struct TimeSeries {
    pub variable: Variable,
    #[serde(default)]
    pub values: Vec<ValueBlock>,
}

#[derive(Debug, Deserialize)]
pub struct Variable {
    #[serde(rename = "variableCode", default)]
    pub variable_code: Vec<VariableCode>,
    pub unit: VariableUnit,
}

#[derive(Debug, Deserialize)]
pub struct VariableCode {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct VariableUnit {
    #[serde(rename = "unitCode")]
    pub unit_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ValueBlock {
    #[serde(default)]
    pub value: Vec<RawSample>,
}

#[derive(Debug, Deserialize)]
pub struct RawSample {
    #[serde(rename = "dateTime")]
    pub date_time: String,
    pub value: String,
}

impl TimeSeries {
    fn code(&self) -> Option<&str> {
        self.variable.variable_code.first().map(|c| c.value.as_str())
    }
}

fn find_series<'a>(response: &'a UsgsResponse, code: &str) -> Result<&'a TimeSeries, FeedError> {
    response
        .value
        .time_series
        .iter()
        .find(|ts| ts.code() == Some(code))
        .ok_or_else(|| FeedError::MissingSeries(code.to_string()))
}

/// Converts one series into a reading. Samples are sorted oldest first
/// (stable, so equal timestamps keep upstream order) and the newest sample
/// becomes `current`, whatever order upstream delivered them in.
fn series_reading(series: &TimeSeries, code: &str) -> Result<SeriesReading, FeedError> {
    let raw = series
        .values
        .first()
        .map(|block| block.value.as_slice())
        .unwrap_or_default();

    let mut history = raw
        .iter()
        .map(|sample| {
            let date_time = DateTime::parse_from_rfc3339(&sample.date_time).map_err(|e| {
                FeedError::InvalidFormat(format!(
                    "Series {code}: invalid dateTime '{}': {e}",
                    sample.date_time
                ))
            })?;
            let value = sample.value.trim().parse::<f64>().map_err(|_| {
                FeedError::InvalidFormat(format!(
                    "Series {code}: non-numeric value '{}'",
                    sample.value
                ))
            })?;
            Ok(Sample { date_time, value })
        })
        .collect::<Result<Vec<_>, FeedError>>()?;

    history.sort_by_key(|sample| sample.date_time);

    let latest = history
        .last()
        .cloned()
        .ok_or_else(|| FeedError::InvalidFormat(format!("Series {code} has no samples")))?;

    Ok(SeriesReading {
        current: latest.value,
        unit: series.variable.unit.unit_code.clone(),
        last_updated: latest.date_time,
        history,
    })
}

/// Extracts the temperature and discharge series from a decoded response
pub fn parse_water_data(response: &UsgsResponse) -> Result<WaterData, FeedError> {
    if response.value.time_series.is_empty() {
        return Err(FeedError::InvalidFormat(
            "Response contains no time series".to_string(),
        ));
    }

    let temperature = find_series(response, USGS_TEMPERATURE_CODE)?;
    let discharge = find_series(response, USGS_DISCHARGE_CODE)?;

    Ok(WaterData {
        temperature: series_reading(temperature, USGS_TEMPERATURE_CODE)?,
        discharge: series_reading(discharge, USGS_DISCHARGE_CODE)?,
    })
}

/// Decodes a raw JSON body and extracts the water data
pub fn parse_water_data_json(body: &str) -> Result<WaterData, FeedError> {
    let response: UsgsResponse = serde_json::from_str(body)
        .map_err(|e| FeedError::InvalidFormat(format!("Invalid JSON: {e}")))?;
    parse_water_data(&response)
}

/// Client for the time-series feed
pub struct UsgsClient {
    fetcher: Arc<Fetcher>,
    request_url: String,
    retry: RetryPolicy,
}

impl UsgsClient {
    pub fn new(config: &UsgsFeedConfig, fetcher: Arc<Fetcher>) -> Result<Self, FeedError> {
        Ok(Self {
            fetcher,
            request_url: Self::build_request_url(config)?,
            retry: config.retry_policy(),
        })
    }

    /// Creates a client with its own HTTP client using the configured timeout
    pub fn from_config(config: &UsgsFeedConfig) -> Result<Self, FeedError> {
        let fetcher = Fetcher::new(Duration::from_secs(config.timeout_secs))?;
        Self::new(config, Arc::new(fetcher))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn build_request_url(config: &UsgsFeedConfig) -> Result<String, FeedError> {
        let parameter_codes = format!("{USGS_TEMPERATURE_CODE},{USGS_DISCHARGE_CODE}");
        let url = Url::parse_with_params(
            &config.base_url,
            &[
                ("format", "json"),
                ("sites", config.sites.join(",").as_str()),
                ("parameterCd", parameter_codes.as_str()),
                ("period", config.period.as_str()),
            ],
        )
        .map_err(|e| {
            FeedError::InvalidFormat(format!("Invalid base URL '{}': {e}", config.base_url))
        })?;

        Ok(url.to_string())
    }

    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    /// Fetches the latest temperature and discharge series. Only the
    /// transport is retried; payload validation errors surface immediately.
    pub async fn fetch_water_data(&self) -> Result<WaterData, FeedError> {
        let body = with_retry(&self.retry, FEED_NAME, || {
            self.fetcher.fetch_text(&self.request_url, FEED_NAME)
        })
        .await?;

        let data = parse_water_data_json(&body).map_err(|e| {
            DatasourceMetrics::record_parse_error(FEED_NAME, e.kind());
            e
        })?;

        info!(
            "Fetched water data: temperature={}{} discharge={}{}",
            data.temperature.current,
            data.temperature.unit,
            data.discharge.current,
            data.discharge.unit
        );
        debug!(
            "History lengths: temperature={}, discharge={}",
            data.temperature.history.len(),
            data.discharge.history.len()
        );
        Ok(data)
    }
}
