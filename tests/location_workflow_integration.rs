use std::sync::Arc;
use std::time::Duration;

use waterwatch::conditions::LocationService;
use waterwatch::config::models::{NdbcFeedConfig, StorageBackend, StorageConfig};
use waterwatch::feeds::{Fetcher, NdbcClient, RetryPolicy};
use waterwatch::models::Region;
use waterwatch::storage::{open_store, Cache};
use waterwatch::WaterwatchError;

const STATIONS_BODY: &str = "# STATION_ID | LAT | LON | NAME\n\
                             # text | deg | deg | text\n\
                             46012 37.363 -122.881 \"HALF MOON BAY\"\n\
                             44013 42.346 -70.651 \"BOSTON 16 NM East of Boston\"\n\
                             51201 21.671 -158.118 \"WAIMEA BAY\"\n";

const OBSERVATION_BODY: &str = "#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE\n\
                                #yr  mo dy hr mn degT m/s  m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft\n\
                                2024 05 17 14 50 250  5.1  6.2   1.4   8.0   6.1 270 1015.2  16.1  18.5  12.0   MM +0.3    MM\n";

async fn service(
    server: &mockito::ServerGuard,
    storage: &StorageConfig,
) -> LocationService {
    let config = NdbcFeedConfig {
        base_url: format!("{}/data/realtime2", server.url()),
        stations_url: format!("{}/data/stations.txt", server.url()),
        ..Default::default()
    };
    let fetcher = Arc::new(Fetcher::new(Duration::from_secs(5)).unwrap());
    let ndbc = NdbcClient::new(&config, fetcher)
        .with_retry_policy(RetryPolicy::new(1, Duration::from_millis(1)));

    let cache = Cache::new(open_store(storage).await.unwrap());
    LocationService::new(Arc::new(ndbc), cache)
}

#[tokio::test]
async fn test_tracked_locations_survive_restart() {
    let mut server = mockito::Server::new_async().await;
    let _stations = server
        .mock("GET", "/data/stations.txt")
        .with_status(200)
        .with_body(STATIONS_BODY)
        .create_async()
        .await;
    let observation = server
        .mock("GET", "/data/realtime2/46012.txt")
        .with_status(200)
        .with_body(OBSERVATION_BODY)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = StorageConfig {
        backend: StorageBackend::Sqlite,
        path: Some(dir.path().join("waterwatch.sqlite")),
    };

    let location_id = {
        let svc = service(&server, &storage).await;

        let west = svc
            .search_stations(None, Some(Region::WestCoast))
            .await
            .unwrap();
        assert_eq!(west.len(), 1);
        assert_eq!(west[0].id, "46012");

        let location = svc.add_station("46012").await.unwrap();
        let group = svc.create_group("Surf").await;
        svc.add_to_group(&group.id, &location.id).await.unwrap();
        svc.toggle_favorite(&location.id).await.unwrap();

        let conditions = svc.conditions_for(&location.id).await.unwrap();
        assert_eq!(conditions.water_temperature.value, 18.5);
        assert_eq!(conditions.wave_height.value, 1.4);
        location.id
    };

    let svc = service(&server, &storage).await;
    let location = svc.location(&location_id).await.unwrap();
    assert!(location.is_favorite);
    assert_eq!(location.user_groups.len(), 1);

    // Served from the cache, so the observation file is not requested again
    let conditions = svc.conditions_for(&location_id).await.unwrap();
    assert_eq!(conditions.wind_direction.value, 250.0);
    observation.assert_async().await;

    let groups = svc.groups().await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].location_ids, vec![location_id.clone()]);
}

#[tokio::test]
async fn test_unknown_station_and_cascade_on_key_value_store() {
    let mut server = mockito::Server::new_async().await;
    let _stations = server
        .mock("GET", "/data/stations.txt")
        .with_status(200)
        .with_body(STATIONS_BODY)
        .create_async()
        .await;
    let _observation = server
        .mock("GET", "/data/realtime2/51201.txt")
        .with_status(200)
        .with_body(OBSERVATION_BODY)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = StorageConfig {
        backend: StorageBackend::KeyValue,
        path: Some(dir.path().to_path_buf()),
    };
    let svc = service(&server, &storage).await;

    let err = svc.add_station("99999").await.unwrap_err();
    assert!(matches!(err, WaterwatchError::NotFound { .. }));

    let location = svc.add_station("51201").await.unwrap();
    assert_eq!(location.region, Region::Hawaii);
    let group = svc.create_group("Hawaii").await;
    svc.add_to_group(&group.id, &location.id).await.unwrap();
    svc.refresh_conditions(&location.id).await.unwrap();

    svc.delete_location(&location.id).await.unwrap();

    assert!(svc.locations().await.unwrap().is_empty());
    assert!(svc.group(&group.id).await.unwrap().location_ids.is_empty());
    assert!(svc.all_conditions().await.unwrap().is_empty());
}
