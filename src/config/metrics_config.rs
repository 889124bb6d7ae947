use serde::{Deserialize, Serialize};

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics collection
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Metrics server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Category-specific configuration
    #[serde(default)]
    pub categories: MetricCategories,
}

/// Individual metric category toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricCategories {
    /// Feed request/parse health
    #[serde(default = "default_true")]
    pub datasource: bool,

    /// Cache reads, fallbacks and swallowed write failures
    #[serde(default = "default_true")]
    pub cache: bool,

    /// Scheduled and manual refresh runs
    #[serde(default = "default_true")]
    pub refresh: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            port: default_port(),
            categories: MetricCategories::default(),
        }
    }
}

impl Default for MetricCategories {
    fn default() -> Self {
        Self {
            datasource: true,
            cache: true,
            refresh: true,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    crate::constants::metrics::METRICS_SERVER_PORT
}

fn default_true() -> bool {
    true
}

impl MetricsConfig {
    /// Check if a specific category is enabled
    pub fn is_category_enabled(&self, category: MetricCategory) -> bool {
        if !self.enabled {
            return false;
        }

        match category {
            MetricCategory::Datasource => self.categories.datasource,
            MetricCategory::Cache => self.categories.cache,
            MetricCategory::Refresh => self.categories.refresh,
        }
    }
}

/// Metric category enum for runtime checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricCategory {
    Datasource,
    Cache,
    Refresh,
}
