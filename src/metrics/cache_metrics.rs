use crate::config::metrics_config::MetricCategory;
use crate::metrics::config_manager::is_metric_enabled;
use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, CounterVec, Gauge};

lazy_static! {
    /// Cache operations by operation and outcome
    static ref CACHE_OPERATIONS: CounterVec = register_counter_vec!(
        "waterwatch_cache_operations_total",
        "Cache reads and writes by outcome",
        &["operation", "outcome"]
    ).expect("Failed to create cache_operations metric");

    /// Loads served from the cache instead of the network
    static ref CACHE_FALLBACKS: CounterVec = register_counter_vec!(
        "waterwatch_cache_fallbacks_total",
        "Loads that fell back to cached data",
        &["reason"]
    ).expect("Failed to create cache_fallbacks metric");

    /// Refresh runs by trigger and outcome
    static ref REFRESH_RUNS: CounterVec = register_counter_vec!(
        "waterwatch_refresh_runs_total",
        "Conditions refresh runs",
        &["mode", "outcome"]
    ).expect("Failed to create refresh_runs metric");

    /// Unix timestamp of the last successful network refresh
    static ref LAST_REFRESH_TIMESTAMP: Gauge = register_gauge!(
        "waterwatch_last_refresh_timestamp",
        "Unix timestamp of the last successful network refresh"
    ).expect("Failed to create last_refresh_timestamp metric");
}

/// Cache and refresh metrics collector
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn record_operation(operation: &str, success: bool) {
        if !is_metric_enabled(MetricCategory::Cache) {
            return;
        }
        let outcome = if success { "ok" } else { "failed" };
        CACHE_OPERATIONS
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn record_fallback(reason: &str) {
        if !is_metric_enabled(MetricCategory::Cache) {
            return;
        }
        CACHE_FALLBACKS.with_label_values(&[reason]).inc();
    }

    pub fn record_refresh(mode: &str, success: bool) {
        if !is_metric_enabled(MetricCategory::Refresh) {
            return;
        }
        let outcome = if success { "ok" } else { "failed" };
        REFRESH_RUNS.with_label_values(&[mode, outcome]).inc();
        if success {
            LAST_REFRESH_TIMESTAMP.set(chrono::Utc::now().timestamp() as f64);
        }
    }
}
