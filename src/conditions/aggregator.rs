use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::alerts::{Alert, AlertSink};
use super::reachability::Reachability;
use crate::error::WaterwatchError;
use crate::feeds::WaterDataFeed;
use crate::metrics::CacheMetrics;
use crate::models::WaterData;
use crate::storage::Cache;

/// Who asked for the load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// User-initiated; failures raise an alert and are returned
    Foreground,
    /// Scheduled refresh or pull-to-refresh; failures fall back to the cache
    Background,
}

impl LoadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadMode::Foreground => "foreground",
            LoadMode::Background => "background",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Network,
    Cache,
}

/// Result of a load: the reading to show and the one it replaced
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionsSnapshot {
    pub current: WaterData,
    /// Reading shown before this network load. Always `None` for cached data.
    pub previous: Option<WaterData>,
    pub source: DataSource,
    pub loaded_at: DateTime<Utc>,
}

impl ConditionsSnapshot {
    pub fn is_offline(&self) -> bool {
        self.source == DataSource::Cache
    }

    pub fn temperature_delta(&self) -> Option<f64> {
        self.previous
            .as_ref()
            .map(|p| self.current.temperature.delta_from(&p.temperature))
    }

    pub fn discharge_delta(&self) -> Option<f64> {
        self.previous
            .as_ref()
            .map(|p| self.current.discharge.delta_from(&p.discharge))
    }
}

/// Loads the current temperature and discharge readings.
///
/// Online loads fetch, persist and remember the previous value; offline
/// loads read the cache. Concurrent loads are not deduplicated and the last
/// one to finish wins. Every load is tied to the aggregator's session token,
/// so [`close`](Self::close) aborts in-flight work.
pub struct ConditionsAggregator {
    feed: Arc<dyn WaterDataFeed>,
    cache: Cache,
    reachability: Arc<dyn Reachability>,
    alerts: Arc<dyn AlertSink>,
    session: CancellationToken,
    state: Mutex<Option<ConditionsSnapshot>>,
}

impl ConditionsAggregator {
    pub fn new(
        feed: Arc<dyn WaterDataFeed>,
        cache: Cache,
        reachability: Arc<dyn Reachability>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            feed,
            cache,
            reachability,
            alerts,
            session: CancellationToken::new(),
            state: Mutex::new(None),
        }
    }

    /// Last successful snapshot, if any
    pub async fn snapshot(&self) -> Option<ConditionsSnapshot> {
        self.state.lock().await.clone()
    }

    /// Cancels in-flight and future loads
    pub fn close(&self) {
        info!("Closing conditions session");
        self.session.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_cancelled()
    }

    pub async fn load(&self, mode: LoadMode) -> Result<ConditionsSnapshot, WaterwatchError> {
        let token = self.session.child_token();

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(WaterwatchError::Cancelled),
            result = self.load_inner() => result,
        };

        CacheMetrics::record_refresh(mode.as_str(), result.is_ok());

        match result {
            Ok(snapshot) => Ok(snapshot),
            Err(WaterwatchError::Cancelled) => {
                debug!("{} load cancelled", mode.as_str());
                Err(WaterwatchError::Cancelled)
            }
            Err(e) => match mode {
                LoadMode::Foreground => {
                    error!("Error loading data: {}", e);
                    self.alerts.alert(Alert::error(format!(
                        "Failed to fetch water data: {}",
                        e.user_message()
                    )));
                    Err(e)
                }
                LoadMode::Background => self.fall_back(e).await,
            },
        }
    }

    async fn load_inner(&self) -> Result<ConditionsSnapshot, WaterwatchError> {
        if self.reachability.is_reachable().await {
            let data = self.feed.fetch_water_data().await?;
            self.cache.save_data(&data).await;

            let mut state = self.state.lock().await;
            let previous = state.as_ref().map(|s| s.current.clone());
            let snapshot = ConditionsSnapshot {
                current: data,
                previous,
                source: DataSource::Network,
                loaded_at: Utc::now(),
            };
            *state = Some(snapshot.clone());
            Ok(snapshot)
        } else {
            info!("Network unreachable, loading cached water data");
            let cached = self.cache.get_latest_data().await?;
            CacheMetrics::record_fallback("offline");
            Ok(self.store_cached(cached).await)
        }
    }

    async fn store_cached(&self, data: WaterData) -> ConditionsSnapshot {
        let snapshot = ConditionsSnapshot {
            current: data,
            previous: None,
            source: DataSource::Cache,
            loaded_at: Utc::now(),
        };
        *self.state.lock().await = Some(snapshot.clone());
        snapshot
    }

    /// Background failures degrade to the cached value without alerting
    async fn fall_back(
        &self,
        cause: WaterwatchError,
    ) -> Result<ConditionsSnapshot, WaterwatchError> {
        warn!("Background load failed: {}. Falling back to cache", cause);

        if self.session.is_cancelled() {
            return Err(WaterwatchError::Cancelled);
        }

        match self.cache.get_latest_data().await {
            Ok(cached) => {
                CacheMetrics::record_fallback("background_failure");
                Ok(self.store_cached(cached).await)
            }
            Err(e) => {
                error!("No cached water data to fall back to: {}", e);
                Err(cause)
            }
        }
    }
}
