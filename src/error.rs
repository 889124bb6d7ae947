use thiserror::Error;

#[derive(Debug, Error)]
pub enum WaterwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::parser::ConfigError),

    #[error("Feed error: {0}")]
    Feed(#[from] crate::feeds::FeedError),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("Load cancelled")]
    Cancelled,

    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },
}

impl WaterwatchError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        WaterwatchError::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Message shown to the user in an alert
    pub fn user_message(&self) -> String {
        match self {
            WaterwatchError::Feed(e) if e.is_transient() => {
                "Unable to reach the data service. Please check your connection and try again."
                    .to_string()
            }
            WaterwatchError::Feed(e) => format!("The data service returned unexpected data: {e}"),
            WaterwatchError::Storage(crate::storage::StorageError::NoData) => {
                "No data available. Connect to the internet to load conditions.".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WaterwatchError>;
