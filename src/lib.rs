//! Waterwatch: marine buoy and river conditions with an offline cache

pub mod cli;
pub mod conditions;
pub mod config;
pub mod constants;
pub mod error;
pub mod error_context;
pub mod feeds;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod storage;

pub use error::{Result, WaterwatchError};
