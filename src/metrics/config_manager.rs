use crate::config::metrics_config::{MetricCategory, MetricsConfig};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::warn;

/// Global metrics configuration
static METRICS_CONFIG: OnceCell<Arc<MetricsConfig>> = OnceCell::new();

/// Initialize the global metrics configuration. Only the first call wins.
pub fn init_metrics_config(config: MetricsConfig) {
    if METRICS_CONFIG.set(Arc::new(config)).is_err() {
        warn!("Metrics config already initialized, ignoring new configuration");
    }
}

/// Check if a metric category is enabled
pub fn is_metric_enabled(category: MetricCategory) -> bool {
    METRICS_CONFIG
        .get()
        .map(|config| config.is_category_enabled(category))
        .unwrap_or(true) // Default to enabled if not initialized
}
