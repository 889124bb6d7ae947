#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
    use tempfile::TempDir;

    use crate::config::models::{StorageBackend, StorageConfig};
    use crate::models::{
        Location, LocationGroup, NdbcStation, Observation, Region, Sample, SeriesReading,
        WaterConditions, WaterData,
    };
    use crate::storage::{open_store, Cache, CacheStore, KeyValueStore, SqliteStore, StorageError};

    /// Both backends, each in its own temporary directory
    async fn stores() -> Vec<(Arc<dyn CacheStore>, TempDir)> {
        let sqlite_dir = tempfile::tempdir().unwrap();
        let sqlite = SqliteStore::open(&sqlite_dir.path().join("cache.db"))
            .await
            .unwrap();

        let kv_dir = tempfile::tempdir().unwrap();
        let kv = KeyValueStore::open(kv_dir.path()).await.unwrap();

        vec![
            (Arc::new(sqlite) as Arc<dyn CacheStore>, sqlite_dir),
            (Arc::new(kv) as Arc<dyn CacheStore>, kv_dir),
        ]
    }

    fn location(id: &str, station: &str) -> Location {
        Location {
            id: id.to_string(),
            name: format!("Station {station}"),
            region: Region::WestCoast,
            latitude: 37.363,
            longitude: -122.881,
            ndbc_station_id: station.to_string(),
            is_favorite: false,
            user_groups: Vec::new(),
            last_updated: Utc.with_ymd_and_hms(2024, 5, 17, 12, 0, 0).unwrap(),
        }
    }

    fn conditions(
        location_id: &str,
        timestamp: DateTime<Utc>,
        temperature: f64,
    ) -> WaterConditions {
        WaterConditions {
            location_id: location_id.to_string(),
            timestamp,
            water_temperature: Observation::new(temperature, "degC"),
            wave_height: Observation::new(1.2, "m"),
            wave_period: Observation::new(8.0, "s"),
            wave_direction: Observation::new(270.0, "deg"),
            wind_speed: Observation::new(5.1, "m/s"),
            wind_direction: Observation::new(250.0, "deg"),
        }
    }

    fn water_data(temperature: f64, discharge: f64) -> WaterData {
        let at: DateTime<FixedOffset> =
            DateTime::parse_from_rfc3339("2024-05-01T12:00:00-04:00").unwrap();
        let series = |value: f64, unit: &str| SeriesReading {
            current: value,
            unit: unit.to_string(),
            last_updated: at,
            history: vec![Sample {
                date_time: at,
                value,
            }],
        };
        WaterData {
            temperature: series(temperature, "deg C"),
            discharge: series(discharge, "ft3/s"),
        }
    }

    #[tokio::test]
    async fn test_latest_data_empty_is_no_data() {
        for (store, _dir) in stores().await {
            let result = store.get_latest_data().await;
            assert!(
                matches!(result, Err(StorageError::NoData)),
                "{} should report NoData",
                store.backend_name()
            );
        }
    }

    #[tokio::test]
    async fn test_latest_data_is_last_write() {
        for (store, _dir) in stores().await {
            store.save_data(&water_data(10.0, 5000.0)).await.unwrap();
            store.save_data(&water_data(11.5, 5230.0)).await.unwrap();

            let latest = store.get_latest_data().await.unwrap();
            assert_eq!(latest.temperature.current, 11.5, "{}", store.backend_name());
            assert_eq!(latest.discharge.current, 5230.0, "{}", store.backend_name());
            assert_eq!(
                latest.temperature.last_updated,
                DateTime::parse_from_rfc3339("2024-05-01T12:00:00-04:00").unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_sqlite_latest_data_has_reduced_fidelity() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.save_data(&water_data(11.5, 5230.0)).await.unwrap();

        let latest = store.get_latest_data().await.unwrap();
        assert_eq!(latest.temperature.unit, "degC");
        assert_eq!(latest.discharge.unit, "ft3/s");
        assert!(latest.temperature.history.is_empty());
    }

    #[tokio::test]
    async fn test_location_round_trip() {
        for (store, _dir) in stores().await {
            let loc = location("loc-1", "46012");
            store.save_location(&loc).await.unwrap();

            let loaded = store.get_location("loc-1").await.unwrap();
            assert_eq!(loaded, Some(loc.clone()), "{}", store.backend_name());
            assert_eq!(store.get_locations().await.unwrap(), vec![loc]);
            assert_eq!(store.get_location("missing").await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_new_entities_round_trip_exactly() {
        let station = NdbcStation {
            id: "46012".to_string(),
            name: "HALF MOON BAY".to_string(),
            latitude: 37.363,
            longitude: -122.881,
            region: Region::WestCoast,
            has_water_temperature: true,
            has_wave_height: true,
        };

        for (store, _dir) in stores().await {
            let name = store.backend_name();
            let loc = Location::from_station(&station);
            store.save_location(&loc).await.unwrap();

            let group = LocationGroup::new("Surf");
            store.save_location_group(&group).await.unwrap();

            assert_eq!(store.get_location(&loc.id).await.unwrap(), Some(loc), "{name}");
            assert_eq!(
                store.get_location_group(&group.id).await.unwrap(),
                Some(group),
                "{name}"
            );
        }
    }

    #[tokio::test]
    async fn test_save_location_upserts_in_place() {
        for (store, _dir) in stores().await {
            store.save_location(&location("a", "46012")).await.unwrap();
            store.save_location(&location("b", "44013")).await.unwrap();

            let mut favorite = location("a", "46012");
            favorite.is_favorite = true;
            store.save_location(&favorite).await.unwrap();

            let all = store.get_locations().await.unwrap();
            let ids: Vec<&str> = all.iter().map(|l| l.id.as_str()).collect();
            assert_eq!(ids, vec!["a", "b"], "{}", store.backend_name());
            assert!(all[0].is_favorite);
        }
    }

    #[tokio::test]
    async fn test_delete_location_cascades() {
        for (store, _dir) in stores().await {
            store.save_location(&location("a", "46012")).await.unwrap();
            store.save_location(&location("b", "44013")).await.unwrap();

            let mut group = LocationGroup::new("Bay Area");
            group.location_ids = vec!["a".to_string(), "b".to_string()];
            store.save_location_group(&group).await.unwrap();

            let now = Utc::now();
            store.save_water_conditions(&conditions("a", now, 15.0)).await.unwrap();
            store.save_water_conditions(&conditions("b", now, 16.0)).await.unwrap();

            store.delete_location("a").await.unwrap();

            let name = store.backend_name();
            assert_eq!(store.get_location("a").await.unwrap(), None, "{name}");
            assert_eq!(store.get_locations().await.unwrap().len(), 1, "{name}");

            let group = store.get_location_group(&group.id).await.unwrap().unwrap();
            assert_eq!(group.location_ids, vec!["b"], "{name}");
            assert!(store
                .get_location_groups()
                .await
                .unwrap()
                .iter()
                .all(|g| !g.location_ids.contains(&"a".to_string())));

            assert_eq!(store.get_water_conditions("a").await.unwrap(), None, "{name}");
            let all = store.get_all_water_conditions().await.unwrap();
            assert_eq!(all.len(), 1, "{name}");
            assert!(all.contains_key("b"));
        }
    }

    #[tokio::test]
    async fn test_group_membership_is_replaced_not_merged() {
        for (store, _dir) in stores().await {
            for id in ["a", "b", "c"] {
                store.save_location(&location(id, "46012")).await.unwrap();
            }

            let mut group = LocationGroup::new("Favourites");
            group.location_ids = vec!["a".to_string(), "b".to_string()];
            store.save_location_group(&group).await.unwrap();

            group.location_ids = vec!["c".to_string(), "c".to_string()];
            group.name = "Renamed".to_string();
            store.save_location_group(&group).await.unwrap();

            let name = store.backend_name();
            let loaded = store.get_location_group(&group.id).await.unwrap().unwrap();
            assert_eq!(loaded.name, "Renamed", "{name}");
            assert_eq!(loaded.location_ids, vec!["c"], "{name}");
            assert_eq!(store.get_location_groups().await.unwrap().len(), 1, "{name}");

            // user_groups follows membership
            let a = store.get_location("a").await.unwrap().unwrap();
            let c = store.get_location("c").await.unwrap().unwrap();
            assert!(a.user_groups.is_empty(), "{name}");
            assert_eq!(c.user_groups, vec![group.id.clone()], "{name}");
        }
    }

    #[tokio::test]
    async fn test_delete_location_group() {
        for (store, _dir) in stores().await {
            store.save_location(&location("a", "46012")).await.unwrap();
            let mut group = LocationGroup::new("Temp");
            group.location_ids = vec!["a".to_string()];
            store.save_location_group(&group).await.unwrap();

            store.delete_location_group(&group.id).await.unwrap();

            let name = store.backend_name();
            assert_eq!(store.get_location_group(&group.id).await.unwrap(), None, "{name}");
            let a = store.get_location("a").await.unwrap().unwrap();
            assert!(a.user_groups.is_empty(), "{name}");
        }
    }

    #[tokio::test]
    async fn test_all_conditions_keeps_latest_per_location() {
        for (store, _dir) in stores().await {
            let earlier = Utc.with_ymd_and_hms(2024, 5, 17, 14, 0, 0).unwrap();
            let later = earlier + Duration::hours(1);

            store.save_water_conditions(&conditions("a", earlier, 15.0)).await.unwrap();
            store.save_water_conditions(&conditions("a", later, 16.0)).await.unwrap();
            store.save_water_conditions(&conditions("b", earlier, 12.0)).await.unwrap();

            let name = store.backend_name();
            let all = store.get_all_water_conditions().await.unwrap();
            assert_eq!(all.len(), 2, "{name}");
            assert_eq!(all["a"].timestamp, later, "{name}");
            assert_eq!(all["a"].water_temperature.value, 16.0, "{name}");

            let single = store.get_water_conditions("a").await.unwrap().unwrap();
            assert_eq!(single, all["a"], "{name}");
        }
    }

    #[tokio::test]
    async fn test_older_snapshot_does_not_replace_newer() {
        for (store, _dir) in stores().await {
            let later = Utc.with_ymd_and_hms(2024, 5, 17, 15, 0, 0).unwrap();
            let earlier = later - Duration::hours(2);

            store.save_water_conditions(&conditions("a", later, 16.0)).await.unwrap();
            store.save_water_conditions(&conditions("a", earlier, 14.0)).await.unwrap();

            let current = store.get_water_conditions("a").await.unwrap().unwrap();
            assert_eq!(current.timestamp, later, "{}", store.backend_name());
        }
    }

    #[tokio::test]
    async fn test_missing_conditions_is_none() {
        for (store, _dir) in stores().await {
            assert_eq!(store.get_water_conditions("nope").await.unwrap(), None);
            assert!(store.get_all_water_conditions().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_sqlite_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.save_location(&location("a", "46012")).await.unwrap();
        }

        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.get_locations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_store_selects_backend() {
        let dir = tempfile::tempdir().unwrap();

        let sqlite = open_store(&StorageConfig {
            backend: StorageBackend::Sqlite,
            path: Some(dir.path().join("cache.db")),
        })
        .await
        .unwrap();
        assert_eq!(sqlite.backend_name(), "sqlite");

        let kv = open_store(&StorageConfig {
            backend: StorageBackend::KeyValue,
            path: Some(dir.path().join("kv")),
        })
        .await
        .unwrap();
        assert_eq!(kv.backend_name(), "key_value");
    }

    #[tokio::test]
    async fn test_cache_swallows_write_failures() {
        let dir = tempfile::tempdir().unwrap();
        let kv_dir = dir.path().join("kv");
        let store = KeyValueStore::open(&kv_dir).await.unwrap();
        let cache = Cache::new(Arc::new(store));

        // Writes fail once the directory is gone
        std::fs::remove_dir_all(&kv_dir).unwrap();

        cache.save_location(&location("a", "46012")).await;
        cache.save_data(&water_data(1.0, 2.0)).await;

        assert!(cache.get_locations().await.unwrap().is_empty());
        assert!(matches!(
            cache.get_latest_data().await,
            Err(StorageError::NoData)
        ));
    }
}
