//! Orchestration of feeds, cache and reachability for the front end

pub mod aggregator;
pub mod alerts;
pub mod locations;
pub mod reachability;
pub mod scheduler;

pub use aggregator::{ConditionsAggregator, ConditionsSnapshot, DataSource, LoadMode};
pub use alerts::{Alert, AlertSink, CollectingAlertSink, LogAlertSink};
pub use locations::LocationService;
pub use reachability::{HttpReachability, Reachability, StaticReachability};
pub use scheduler::RefreshScheduler;
