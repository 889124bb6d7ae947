use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info, warn};

use super::aggregator::{ConditionsAggregator, LoadMode};
use crate::config::models::RefreshConfig;
use crate::error::WaterwatchError;

/// Runs background loads on the configured cron schedule
pub struct RefreshScheduler {
    config: RefreshConfig,
    aggregator: Arc<ConditionsAggregator>,
    scheduler: JobScheduler,
}

impl RefreshScheduler {
    pub async fn new(
        config: RefreshConfig,
        aggregator: Arc<ConditionsAggregator>,
    ) -> Result<Self, WaterwatchError> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            config,
            aggregator,
            scheduler,
        })
    }

    /// Registers the refresh job and starts the scheduler
    pub async fn start(&mut self) -> Result<(), WaterwatchError> {
        if !self.config.enabled {
            info!("Scheduled refresh is disabled in configuration");
            return Ok(());
        }

        let schedule = &self.config.schedule;
        info!("Starting refresh scheduler with cron schedule: {}", schedule);

        let aggregator = Arc::clone(&self.aggregator);

        let job = Job::new_async(schedule.as_str(), move |_uuid, _l| {
            let aggregator = Arc::clone(&aggregator);

            Box::pin(async move {
                info!("Running scheduled refresh");
                match aggregator.load(LoadMode::Background).await {
                    Ok(snapshot) => debug!(
                        "Scheduled refresh loaded temperature={} discharge={} from {:?}",
                        snapshot.current.temperature.current,
                        snapshot.current.discharge.current,
                        snapshot.source
                    ),
                    Err(e) => warn!("Scheduled refresh failed: {}", e),
                }
            })
        })?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;

        info!("Refresh scheduler started successfully");
        Ok(())
    }

    /// Stops the scheduler and cancels the aggregator's in-flight loads
    pub async fn stop(&mut self) -> Result<(), WaterwatchError> {
        info!("Stopping refresh scheduler");
        self.aggregator.close();
        self.scheduler.shutdown().await?;
        Ok(())
    }
}
