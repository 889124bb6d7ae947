//! Application-wide constants
//!
//! Upstream endpoints, parameter codes, retry and storage defaults.

/// Feed-related constants
pub mod feeds {
    /// Realtime per-station files live under this prefix as `<station>.txt`
    pub const NDBC_BASE_URL: &str = "https://www.ndbc.noaa.gov/data/realtime2/";

    /// Whitespace-delimited station list
    pub const NDBC_STATIONS_URL: &str = "https://www.ndbc.noaa.gov/data/stations.txt";

    /// Instantaneous-values service
    pub const USGS_BASE_URL: &str = "https://waterservices.usgs.gov/nwis/iv/";

    /// Default sites queried from the time-series feed
    pub const USGS_DEFAULT_SITES: [&str; 2] = ["01021050", "01021000"];

    /// Trailing window of samples requested from the time-series feed
    pub const USGS_DEFAULT_PERIOD: &str = "P7D";

    /// Parameter code of the water temperature series
    pub const USGS_TEMPERATURE_CODE: &str = "00010";

    /// Parameter code of the discharge series
    pub const USGS_DISCHARGE_CODE: &str = "00060";

    /// Header lines preceding data rows in both buoy text formats
    pub const NDBC_HEADER_LINES: usize = 2;

    /// Minimum fields of a usable station-list row
    pub const NDBC_STATION_MIN_FIELDS: usize = 5;

    /// Minimum fields of a usable observation row
    pub const NDBC_OBSERVATION_MIN_FIELDS: usize = 10;
}

/// Network-related constants
pub mod network {
    /// Default HTTP request timeout (in seconds)
    pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 10;

    /// Total attempts for a failed feed request, including the first one
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Base delay between attempts; attempt `n` waits `n` times this (in milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;

    /// Timeout of the reachability probe (in seconds)
    pub const REACHABILITY_TIMEOUT_SECS: u64 = 5;
}

/// Refresh scheduling constants
pub mod refresh {
    /// Background refresh every 4 hours, on the hour
    pub const DEFAULT_SCHEDULE: &str = "0 0 */4 * * *";
}

/// Storage-related constants
pub mod storage {
    /// Default SQLite database file name
    pub const SQLITE_FILE_NAME: &str = "waterwatch.db";

    /// Default directory name for the key-value blob store
    pub const KV_DIR_NAME: &str = "kv";

    /// Connection pool maximum size
    pub const MAX_POOL_SIZE: u32 = 5;

    /// Unit reported for temperature rows read back from the relational store
    pub const STORED_TEMPERATURE_UNIT: &str = "degC";

    /// Unit reported for discharge rows read back from the relational store
    pub const STORED_DISCHARGE_UNIT: &str = "ft3/s";
}

/// Metrics-related constants
pub mod metrics {
    /// Port for Prometheus metrics server
    pub const METRICS_SERVER_PORT: u16 = 9090;
}
