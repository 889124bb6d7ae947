use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use validator::Validate;

use super::models::{data_dir, StorageBackend, WaterwatchConfig};

/// Errors that can occur during configuration parsing
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to open config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Configuration validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Configuration error: {0}")]
    Other(String),
}

/// Provides default configuration file path
pub fn default_config_path() -> PathBuf {
    data_dir().join("config.yaml")
}

/// Parses and validates a configuration document
pub fn parse_config(content: &str) -> Result<WaterwatchConfig, ConfigError> {
    // An empty document deserializes to unit, not to an empty mapping
    let config: WaterwatchConfig = if content.trim().is_empty() {
        WaterwatchConfig::default()
    } else {
        serde_yaml::from_str(content)?
    };

    config.validate()?;

    if let (StorageBackend::KeyValue, Some(path)) = (config.storage.backend, &config.storage.path) {
        if path.is_file() {
            return Err(ConfigError::Other(format!(
                "storage.path '{}' must be a directory for the key_value backend",
                path.display()
            )));
        }
    }

    Ok(config)
}

/// Loads and validates the Waterwatch configuration
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<WaterwatchConfig, ConfigError> {
    let mut file = File::open(&config_path).map_err(ConfigError::FileError)?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(ConfigError::FileError)?;

    parse_config(&content)
}

/// Loads the file when it exists, otherwise returns the defaults
pub fn load_config_or_default<P: AsRef<Path>>(
    config_path: P,
) -> Result<WaterwatchConfig, ConfigError> {
    if config_path.as_ref().exists() {
        load_config(config_path)
    } else {
        Ok(WaterwatchConfig::default())
    }
}
