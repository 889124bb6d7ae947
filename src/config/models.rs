use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use validator::{Validate, ValidationError};

use super::metrics_config::MetricsConfig;
use crate::constants::{feeds, network, refresh, storage};
use crate::feeds::retry::RetryPolicy;

/// The main configuration structure for Waterwatch
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct WaterwatchConfig {
    /// Upstream feed endpoints
    #[serde(default)]
    #[validate]
    pub feeds: FeedsConfig,

    /// Local cache backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Background refresh schedule
    #[serde(default)]
    #[validate]
    pub refresh: RefreshConfig,

    /// Network reachability probe
    #[serde(default)]
    #[validate]
    pub reachability: ReachabilityConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct FeedsConfig {
    #[serde(default)]
    #[validate]
    pub ndbc: NdbcFeedConfig,

    #[serde(default)]
    #[validate]
    pub usgs: UsgsFeedConfig,
}

/// Buoy network endpoints
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NdbcFeedConfig {
    /// Prefix of the per-station realtime files
    #[serde(default = "default_ndbc_base_url")]
    #[validate(url)]
    pub base_url: String,

    /// Station list
    #[serde(default = "default_ndbc_stations_url")]
    #[validate(url)]
    pub stations_url: String,

    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 120))]
    pub timeout_secs: u64,

    /// Total attempts per request, including the first one
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,
}

impl NdbcFeedConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(network::RETRY_BASE_DELAY_MS),
        )
    }
}

impl Default for NdbcFeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_ndbc_base_url(),
            stations_url: default_ndbc_stations_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Time-series service endpoint and query
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UsgsFeedConfig {
    #[serde(default = "default_usgs_base_url")]
    #[validate(url)]
    pub base_url: String,

    /// Site codes passed as `sites`
    #[serde(default = "default_usgs_sites")]
    #[validate(length(min = 1))]
    pub sites: Vec<String>,

    /// ISO-8601 trailing window, e.g. `P7D`
    #[serde(default = "default_usgs_period")]
    #[validate(custom = "validate_period")]
    pub period: String,

    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 120))]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,
}

impl UsgsFeedConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(network::RETRY_BASE_DELAY_MS),
        )
    }
}

impl Default for UsgsFeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_usgs_base_url(),
            sites: default_usgs_sites(),
            period: default_usgs_period(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Which backing store holds the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Durable relational store
    #[default]
    Sqlite,
    /// Flat key-value blob store
    KeyValue,
}

/// Configuration for the local cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database file (sqlite) or directory (key_value). Defaults under
    /// `~/.waterwatch/`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Path to open, falling back to the per-backend default
    pub fn resolved_path(&self) -> PathBuf {
        match (&self.path, self.backend) {
            (Some(path), _) => path.clone(),
            (None, StorageBackend::Sqlite) => data_dir().join(storage::SQLITE_FILE_NAME),
            (None, StorageBackend::KeyValue) => data_dir().join(storage::KV_DIR_NAME),
        }
    }
}

/// Application data directory, `~/.waterwatch` when a home directory exists
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".waterwatch")
}

/// Configuration for the scheduled background refresh
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefreshConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cron schedule (default: "0 0 */4 * * *" - every 4 hours)
    #[serde(default = "default_refresh_schedule")]
    #[validate(custom = "validate_cron_schedule")]
    pub schedule: String,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: default_refresh_schedule(),
        }
    }
}

/// Configuration for the reachability check run before each load
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReachabilityConfig {
    #[serde(default = "default_probe_url")]
    #[validate(url)]
    pub probe_url: String,

    #[serde(default = "default_reachability_timeout")]
    #[validate(range(min = 1, max = 60))]
    pub timeout_secs: u64,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            probe_url: default_probe_url(),
            timeout_secs: default_reachability_timeout(),
        }
    }
}

fn default_ndbc_base_url() -> String {
    feeds::NDBC_BASE_URL.to_string()
}

fn default_ndbc_stations_url() -> String {
    feeds::NDBC_STATIONS_URL.to_string()
}

fn default_usgs_base_url() -> String {
    feeds::USGS_BASE_URL.to_string()
}

fn default_usgs_sites() -> Vec<String> {
    feeds::USGS_DEFAULT_SITES
        .iter()
        .map(|site| site.to_string())
        .collect()
}

fn default_usgs_period() -> String {
    feeds::USGS_DEFAULT_PERIOD.to_string()
}

fn default_timeout_secs() -> u64 {
    network::HTTP_REQUEST_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    network::MAX_ATTEMPTS
}

fn default_refresh_schedule() -> String {
    refresh::DEFAULT_SCHEDULE.to_string()
}

fn default_probe_url() -> String {
    "https://www.ndbc.noaa.gov/".to_string()
}

fn default_reachability_timeout() -> u64 {
    network::REACHABILITY_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

/// Validates a six-field cron expression
fn validate_cron_schedule(schedule: &str) -> Result<(), ValidationError> {
    cron::Schedule::from_str(schedule)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_cron_schedule"))
}

/// Accepts ISO-8601 durations in days or hours such as `P7D` or `PT12H`
fn validate_period(period: &str) -> Result<(), ValidationError> {
    let body = period
        .strip_prefix("PT")
        .and_then(|rest| rest.strip_suffix('H'))
        .or_else(|| period.strip_prefix('P').and_then(|rest| rest.strip_suffix('D')));

    match body {
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => Ok(()),
        _ => Err(ValidationError::new("invalid_period")),
    }
}
