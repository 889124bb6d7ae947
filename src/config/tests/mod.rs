#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;
    use crate::config::models::StorageBackend;
    use crate::config::parser::{load_config, load_config_or_default, parse_config, ConfigError};

    // Helper function to create a temporary file with content
    fn create_temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes()).expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_valid_configuration() {
        let config_yaml = r#"
        feeds:
          ndbc:
            base_url: http://localhost:8080/realtime2/
            timeout_secs: 5
            max_attempts: 2
          usgs:
            sites: ["01021050"]
            period: PT12H
        storage:
          backend: key_value
          path: /tmp/waterwatch-kv
        refresh:
          schedule: "0 30 */2 * * *"
        metrics:
          enabled: false
        "#;

        let temp_file = create_temp_file(config_yaml);
        let config = load_config(temp_file.path()).expect("Failed to load valid config");

        assert_eq!(config.feeds.ndbc.base_url, "http://localhost:8080/realtime2/");
        assert_eq!(config.feeds.ndbc.stations_url, "https://www.ndbc.noaa.gov/data/stations.txt");
        assert_eq!(config.feeds.ndbc.timeout_secs, 5);
        assert_eq!(config.feeds.ndbc.retry_policy().max_attempts, 2);

        assert_eq!(config.feeds.usgs.sites, vec!["01021050".to_string()]);
        assert_eq!(config.feeds.usgs.period, "PT12H");
        assert_eq!(config.feeds.usgs.max_attempts, 3);

        assert_eq!(config.storage.backend, StorageBackend::KeyValue);
        assert_eq!(config.storage.resolved_path(), PathBuf::from("/tmp/waterwatch-kv"));
        assert_eq!(config.refresh.schedule, "0 30 */2 * * *");
        assert!(config.refresh.enabled);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_empty_configuration_uses_defaults() {
        let config = parse_config("").expect("Empty config should be valid");

        assert_eq!(config.feeds.usgs.sites, vec!["01021050", "01021000"]);
        assert_eq!(config.feeds.usgs.period, "P7D");
        assert_eq!(config.feeds.ndbc.timeout_secs, 10);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.storage.resolved_path().ends_with("waterwatch.db"));
        assert_eq!(config.refresh.schedule, "0 0 */4 * * *");
        assert_eq!(config.reachability.timeout_secs, 5);
        assert_eq!(config.metrics.port, 9090);
    }

    #[test]
    fn test_invalid_cron_schedule() {
        let config_yaml = r#"
        refresh:
          schedule: "every four hours"
        "#;

        let result = parse_config(config_yaml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config_yaml = r#"
        feeds:
          usgs:
            max_attempts: 0
        "#;

        let result = parse_config(config_yaml);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_empty_sites_rejected() {
        let config_yaml = r#"
        feeds:
          usgs:
            sites: []
        "#;

        assert!(matches!(
            parse_config(config_yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_period_rejected() {
        let config_yaml = r#"
        feeds:
          usgs:
            period: 7 days
        "#;

        assert!(matches!(
            parse_config(config_yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config_yaml = r#"
        reachability:
          probe_url: not a url
        "#;

        assert!(matches!(
            parse_config(config_yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_unknown_backend_is_parse_error() {
        let config_yaml = r#"
        storage:
          backend: indexeddb
        "#;

        assert!(matches!(
            parse_config(config_yaml),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_key_value_path_must_not_be_a_file() {
        let existing = create_temp_file("not a directory");
        let config_yaml = format!(
            "storage:\n  backend: key_value\n  path: {}\n",
            existing.path().display()
        );

        assert!(matches!(
            parse_config(&config_yaml),
            Err(ConfigError::Other(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config("/nonexistent/waterwatch/config.yaml");
        assert!(matches!(result, Err(ConfigError::FileError(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config_or_default("/nonexistent/waterwatch/config.yaml")
            .expect("Defaults should load");
        assert!(config.refresh.enabled);
    }
}
