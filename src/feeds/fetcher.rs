use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error};

use crate::metrics::DatasourceMetrics;

/// Errors that can occur when fetching or decoding feed data
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP error with status code: {0}")]
    HttpError(u16),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Required data not found in response: series {0}")]
    MissingSeries(String),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
}

impl FeedError {
    /// Transport failures and server-side statuses are worth retrying;
    /// malformed payloads and client errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::NetworkError(_) => true,
            FeedError::HttpError(status) => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    || *status == StatusCode::REQUEST_TIMEOUT.as_u16()
                    || (500..=599).contains(status)
            }
            FeedError::MissingSeries(_) | FeedError::InvalidFormat(_) => false,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::HttpError(_) => "http",
            FeedError::NetworkError(_) => "network",
            FeedError::MissingSeries(_) => "missing_series",
            FeedError::InvalidFormat(_) => "invalid_format",
        }
    }
}

/// Fetches raw feed bodies with a shared HTTP client
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Creates a new Fetcher whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("waterwatch/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FeedError::NetworkError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Fetches the body of `url` as text, labelling metrics with `feed`
    pub async fn fetch_text(&self, url: &str, feed: &str) -> Result<String, FeedError> {
        debug!("Fetching {} data from: {}", feed, url);
        let start = Instant::now();

        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                DatasourceMetrics::record_http_error(feed, &e.to_string(), start.elapsed());
                error!("Network error fetching from {}: {}", url, e);
                return Err(FeedError::NetworkError(e.to_string()));
            }
        };

        let status = response.status();

        if !status.is_success() {
            DatasourceMetrics::record_http_request(feed, status.as_u16(), start.elapsed(), None);
            error!(
                "HTTP error {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            );
            return Err(FeedError::HttpError(status.as_u16()));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                DatasourceMetrics::record_http_error(feed, &e.to_string(), start.elapsed());
                error!("Failed to read response body from {}: {}", url, e);
                return Err(FeedError::NetworkError(e.to_string()));
            }
        };

        DatasourceMetrics::record_http_request(
            feed,
            status.as_u16(),
            start.elapsed(),
            Some(body.len()),
        );
        debug!("Fetched {} bytes of {} data", body.len(), feed);
        Ok(body)
    }

    /// Issues a HEAD request and reports whether any response came back
    pub async fn probe(&self, url: &str, timeout: Duration) -> bool {
        match self.client.head(url).timeout(timeout).send().await {
            Ok(response) => {
                debug!("Reachability probe to {} answered {}", url, response.status());
                true
            }
            Err(e) => {
                debug!("Reachability probe to {} failed: {}", url, e);
                false
            }
        }
    }
}
