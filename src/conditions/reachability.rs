use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::models::ReachabilityConfig;
use crate::feeds::{FeedError, Fetcher};

/// Answers whether the feeds are worth trying right now
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Probes a URL with a HEAD request. Any HTTP response counts as online.
pub struct HttpReachability {
    fetcher: Arc<Fetcher>,
    probe_url: String,
    timeout: Duration,
}

impl HttpReachability {
    pub fn new(config: &ReachabilityConfig, fetcher: Arc<Fetcher>) -> Self {
        Self {
            fetcher,
            probe_url: config.probe_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn from_config(config: &ReachabilityConfig) -> Result<Self, FeedError> {
        let fetcher = Fetcher::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }
}

#[async_trait]
impl Reachability for HttpReachability {
    async fn is_reachable(&self) -> bool {
        let reachable = self.fetcher.probe(&self.probe_url, self.timeout).await;
        debug!("Network reachable: {}", reachable);
        reachable
    }
}

/// Fixed answer, switchable at runtime. Used for `--offline` and tests.
#[derive(Debug, Default)]
pub struct StaticReachability {
    online: AtomicBool,
}

impl StaticReachability {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl Reachability for StaticReachability {
    async fn is_reachable(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_accepts_any_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("HEAD", "/")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let config = ReachabilityConfig {
            probe_url: format!("{}/", server.url()),
            timeout_secs: 1,
        };
        let reachability = HttpReachability::from_config(&config).unwrap();

        assert!(reachability.is_reachable().await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let config = ReachabilityConfig {
            probe_url: "http://127.0.0.1:1/".to_string(),
            timeout_secs: 1,
        };
        let reachability = HttpReachability::from_config(&config).unwrap();

        assert!(!reachability.is_reachable().await);
    }

    #[tokio::test]
    async fn test_static_reachability_switches() {
        let reachability = StaticReachability::new(false);
        assert!(!reachability.is_reachable().await);
        reachability.set_online(true);
        assert!(reachability.is_reachable().await);
    }
}
