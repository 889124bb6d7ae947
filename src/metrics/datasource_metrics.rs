use crate::config::metrics_config::MetricCategory;
use crate::metrics::config_manager::is_metric_enabled;
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, GaugeVec,
    HistogramVec,
};
use std::time::Duration;
use tracing::{debug, warn};

lazy_static! {
    /// HTTP request count by feed and status
    static ref HTTP_REQUEST_COUNT: CounterVec = register_counter_vec!(
        "waterwatch_feed_http_requests_total",
        "Total number of HTTP requests to upstream feeds",
        &["feed", "status"]
    ).expect("Failed to create http_request_count metric");

    /// HTTP request duration histogram
    static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "waterwatch_feed_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["feed", "status"],
        // Buckets: 10ms to 30s
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).expect("Failed to create http_request_duration metric");

    /// Feed availability (1 = available, 0 = unavailable)
    static ref FEED_AVAILABILITY: GaugeVec = register_gauge_vec!(
        "waterwatch_feed_availability",
        "Feed availability status (1 = available, 0 = unavailable)",
        &["feed"]
    ).expect("Failed to create feed_availability metric");

    /// Retry attempts after a transient failure
    static ref RETRY_COUNT: CounterVec = register_counter_vec!(
        "waterwatch_feed_retries_total",
        "Total number of retried feed requests",
        &["feed"]
    ).expect("Failed to create retry_count metric");

    /// Parse errors counter
    static ref PARSE_ERROR_COUNT: CounterVec = register_counter_vec!(
        "waterwatch_feed_parse_errors_total",
        "Total number of feed payloads that failed validation",
        &["feed", "error_type"]
    ).expect("Failed to create parse_error_count metric");
}

/// Feed request metrics collector
pub struct DatasourceMetrics;

impl DatasourceMetrics {
    /// Record a completed HTTP request
    pub fn record_http_request(
        feed: &str,
        status_code: u16,
        duration: Duration,
        response_size: Option<usize>,
    ) {
        if !is_metric_enabled(MetricCategory::Datasource) {
            return;
        }

        let status = match status_code {
            200..=299 => "success",
            400..=499 => "client_error",
            500..=599 => "server_error",
            _ => "other",
        };

        HTTP_REQUEST_COUNT.with_label_values(&[feed, status]).inc();
        HTTP_REQUEST_DURATION_SECONDS
            .with_label_values(&[feed, status])
            .observe(duration.as_secs_f64());
        FEED_AVAILABILITY
            .with_label_values(&[feed])
            .set(if matches!(status_code, 200..=299) { 1.0 } else { 0.0 });

        debug!(
            "HTTP GET for {}: {} in {:.3}s ({}B)",
            feed,
            status_code,
            duration.as_secs_f64(),
            response_size.unwrap_or(0)
        );
    }

    /// Record a request that never produced an HTTP response
    pub fn record_http_error(feed: &str, error: &str, duration: Duration) {
        if !is_metric_enabled(MetricCategory::Datasource) {
            return;
        }

        HTTP_REQUEST_COUNT.with_label_values(&[feed, "error"]).inc();
        HTTP_REQUEST_DURATION_SECONDS
            .with_label_values(&[feed, "error"])
            .observe(duration.as_secs_f64());
        FEED_AVAILABILITY.with_label_values(&[feed]).set(0.0);

        warn!("HTTP request failed for {}: {}", feed, error);
    }

    pub fn record_retry(feed: &str) {
        if !is_metric_enabled(MetricCategory::Datasource) {
            return;
        }
        RETRY_COUNT.with_label_values(&[feed]).inc();
    }

    pub fn record_parse_error(feed: &str, error_type: &str) {
        if !is_metric_enabled(MetricCategory::Datasource) {
            return;
        }
        PARSE_ERROR_COUNT
            .with_label_values(&[feed, error_type])
            .inc();
    }
}
