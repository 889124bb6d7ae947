pub mod cache_metrics;
pub mod config_manager;
pub mod datasource_metrics;
pub mod server;

pub use cache_metrics::CacheMetrics;
pub use config_manager::{init_metrics_config, is_metric_enabled};
pub use datasource_metrics::DatasourceMetrics;
pub use server::{render_metrics, start_metrics_server};
