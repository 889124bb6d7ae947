//! Error context utilities for consistent error handling
//!
//! Helpers for building the same context strings everywhere a storage,
//! feed or configuration failure is reported.

use anyhow::{Context, Result};

/// Standard error context messages for common operations
pub mod messages {
    /// Create a "Failed to {action} {object}" message
    pub fn failed_to(action: &str, object: &str) -> String {
        format!("Failed to {action} {object}")
    }
}

/// Database-specific error contexts
pub mod database {
    use super::messages;

    pub fn insert(table: &str) -> String {
        messages::failed_to("insert", table)
    }

    pub fn get(table: &str) -> String {
        messages::failed_to("get", table)
    }

    pub fn delete(table: &str) -> String {
        messages::failed_to("delete", table)
    }

    pub fn transaction() -> &'static str {
        "Failed to commit transaction"
    }

    pub fn connection() -> &'static str {
        "Failed to establish database connection"
    }
}

/// Key-value blob store error contexts
pub mod blob {
    use super::messages;

    pub fn read(key: &str) -> String {
        messages::failed_to("read", key)
    }

    pub fn write(key: &str) -> String {
        messages::failed_to("write", key)
    }
}

/// Feed-specific error contexts
pub mod feed {
    pub fn station(station_id: &str) -> String {
        format!("Failed to fetch conditions for station '{station_id}'")
    }

    pub fn station_list() -> &'static str {
        "Failed to fetch station list"
    }
}

/// Configuration-specific error contexts
pub mod config {
    pub fn load(path: &str) -> String {
        format!("Failed to load configuration from '{path}'")
    }
}

/// Extension trait for Result types to add common error contexts
pub trait ErrorContextExt<T> {
    /// Add context with dynamic formatting
    fn context_fmt<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContextExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context_fmt<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.with_context(f)
    }
}
