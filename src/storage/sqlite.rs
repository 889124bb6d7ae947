use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use super::models::{
    format_utc, parse_fixed, LocationGroupRow, LocationRow, MembershipRow, SeriesRow,
    WaterConditionsRow,
};
use super::{CacheStore, StorageError};
use crate::constants::storage::{MAX_POOL_SIZE, STORED_DISCHARGE_UNIT, STORED_TEMPERATURE_UNIT};
use crate::error_context::database;
use crate::models::{Location, LocationGroup, SeriesReading, WaterConditions, WaterData};

const LOCATION_COLUMNS: &str =
    "id, name, region, latitude, longitude, ndbc_station_id, is_favorite, last_updated";

const CONDITIONS_COLUMNS: &str = "location_id, timestamp, \
     water_temperature, water_temperature_unit, wave_height, wave_height_unit, \
     wave_period, wave_period_unit, wave_direction, wave_direction_unit, \
     wind_speed, wind_speed_unit, wind_direction, wind_direction_unit";

/// Durable relational cache backed by SQLite
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens or creates the database file and runs pending migrations
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(StorageError::io(format!(
                        "Failed to create directory {}",
                        parent.display()
                    )))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_POOL_SIZE)
            .connect_with(options)
            .await
            .map_err(StorageError::database(database::connection()))?;

        info!("Opened SQLite cache at {}", path.display());
        Self::with_pool(pool).await
    }

    /// In-memory database on a single connection
    pub async fn open_in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new().filename(":memory:");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StorageError::database(database::connection()))?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    async fn begin(&self) -> Result<Transaction<'_, Sqlite>, StorageError> {
        self.pool
            .begin()
            .await
            .map_err(StorageError::database(database::transaction()))
    }

    async fn latest_series_row(&self, table: &str) -> Result<Option<SeriesRow>, StorageError> {
        sqlx::query_as::<_, SeriesRow>(&format!(
            "SELECT id, value, date_time, last_updated FROM {table} ORDER BY id DESC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::database(database::get(table)))
    }

    /// Group ids per location, in group creation order
    async fn memberships_by_location(&self) -> Result<HashMap<String, Vec<String>>, StorageError> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT m.group_id, m.location_id
            FROM location_group_members m
            JOIN location_groups g ON g.id = m.group_id
            ORDER BY g.rowid, m.rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::database(database::get("location_group_members")))?;

        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            map.entry(row.location_id).or_default().push(row.group_id);
        }
        Ok(map)
    }

    async fn member_ids(&self, group_id: &str) -> Result<Vec<String>, StorageError> {
        let ids: Vec<(String,)> = sqlx::query_as(
            "SELECT location_id FROM location_group_members WHERE group_id = ? ORDER BY rowid",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::database(database::get("location_group_members")))?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}

/// Run pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StorageError> {
    debug!("Running cache migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn series_from_row(row: SeriesRow, unit: &str, table: &str) -> Result<SeriesReading, StorageError> {
    Ok(SeriesReading {
        current: row.value,
        unit: unit.to_string(),
        last_updated: parse_fixed(&format!("{table}.last_updated"), &row.last_updated)?,
        // Only the latest value is kept per row
        history: Vec::new(),
    })
}

async fn insert_series(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    reading: &SeriesReading,
    saved_at: &str,
) -> Result<(), StorageError> {
    sqlx::query(&format!(
        "INSERT INTO {table} (value, date_time, last_updated) VALUES (?, ?, ?)"
    ))
    .bind(reading.current)
    .bind(saved_at)
    .bind(reading.last_updated.to_rfc3339())
    .execute(&mut **tx)
    .await
    .map_err(StorageError::database(database::insert(table)))?;
    Ok(())
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn save_data(&self, data: &WaterData) -> Result<(), StorageError> {
        let saved_at = format_utc(&Utc::now());
        let mut tx = self.begin().await?;

        insert_series(&mut tx, "temperature", &data.temperature, &saved_at).await?;
        insert_series(&mut tx, "discharge", &data.discharge, &saved_at).await?;

        tx.commit()
            .await
            .map_err(StorageError::database(database::transaction()))?;
        debug!("Saved water data at {}", saved_at);
        Ok(())
    }

    async fn get_latest_data(&self) -> Result<WaterData, StorageError> {
        let temperature = self.latest_series_row("temperature").await?;
        let discharge = self.latest_series_row("discharge").await?;

        match (temperature, discharge) {
            (Some(temperature), Some(discharge)) => Ok(WaterData {
                temperature: series_from_row(temperature, STORED_TEMPERATURE_UNIT, "temperature")?,
                discharge: series_from_row(discharge, STORED_DISCHARGE_UNIT, "discharge")?,
            }),
            _ => Err(StorageError::NoData),
        }
    }

    async fn save_location(&self, location: &Location) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO locations (
                id, name, region, latitude, longitude, ndbc_station_id, is_favorite, last_updated
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                region = excluded.region,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                ndbc_station_id = excluded.ndbc_station_id,
                is_favorite = excluded.is_favorite,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&location.id)
        .bind(&location.name)
        .bind(location.region.as_str())
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(&location.ndbc_station_id)
        .bind(location.is_favorite)
        .bind(format_utc(&location.last_updated))
        .execute(&self.pool)
        .await
        .map_err(StorageError::database(database::insert("locations")))?;

        Ok(())
    }

    async fn get_locations(&self) -> Result<Vec<Location>, StorageError> {
        let rows = sqlx::query_as::<_, LocationRow>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations ORDER BY rowid"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::database(database::get("locations")))?;

        let mut memberships = self.memberships_by_location().await?;
        rows.into_iter()
            .map(|row| {
                let groups = memberships.remove(&row.id).unwrap_or_default();
                row.into_location(groups)
            })
            .collect()
    }

    async fn get_location(&self, id: &str) -> Result<Option<Location>, StorageError> {
        let row = sqlx::query_as::<_, LocationRow>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::database(database::get("locations")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let groups: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT m.group_id
            FROM location_group_members m
            JOIN location_groups g ON g.id = m.group_id
            WHERE m.location_id = ?
            ORDER BY g.rowid
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::database(database::get("location_group_members")))?;

        row.into_location(groups.into_iter().map(|(g,)| g).collect())
            .map(Some)
    }

    async fn delete_location(&self, id: &str) -> Result<(), StorageError> {
        let mut tx = self.begin().await?;

        for (table, column) in [
            ("location_group_members", "location_id"),
            ("water_conditions", "location_id"),
            ("locations", "id"),
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE {column} = ?"))
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::database(database::delete(table)))?;
        }

        tx.commit()
            .await
            .map_err(StorageError::database(database::transaction()))?;
        debug!("Deleted location {} and its memberships and conditions", id);
        Ok(())
    }

    async fn save_location_group(&self, group: &LocationGroup) -> Result<(), StorageError> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO location_groups (id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(format_utc(&group.created_at))
        .bind(format_utc(&group.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(StorageError::database(database::insert("location_groups")))?;

        sqlx::query("DELETE FROM location_group_members WHERE group_id = ?")
            .bind(&group.id)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::database(database::delete("location_group_members")))?;

        for location_id in &group.location_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO location_group_members (group_id, location_id) VALUES (?, ?)",
            )
            .bind(&group.id)
            .bind(location_id)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::database(database::insert("location_group_members")))?;
        }

        tx.commit()
            .await
            .map_err(StorageError::database(database::transaction()))?;
        Ok(())
    }

    async fn get_location_groups(&self) -> Result<Vec<LocationGroup>, StorageError> {
        let rows = sqlx::query_as::<_, LocationGroupRow>(
            "SELECT id, name, created_at, updated_at FROM location_groups ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::database(database::get("location_groups")))?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            let members = self.member_ids(&row.id).await?;
            groups.push(row.into_group(members)?);
        }
        Ok(groups)
    }

    async fn get_location_group(&self, id: &str) -> Result<Option<LocationGroup>, StorageError> {
        let row = sqlx::query_as::<_, LocationGroupRow>(
            "SELECT id, name, created_at, updated_at FROM location_groups WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::database(database::get("location_groups")))?;

        match row {
            Some(row) => {
                let members = self.member_ids(&row.id).await?;
                row.into_group(members).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn delete_location_group(&self, id: &str) -> Result<(), StorageError> {
        let mut tx = self.begin().await?;

        for (table, column) in [("location_group_members", "group_id"), ("location_groups", "id")] {
            sqlx::query(&format!("DELETE FROM {table} WHERE {column} = ?"))
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::database(database::delete(table)))?;
        }

        tx.commit()
            .await
            .map_err(StorageError::database(database::transaction()))?;
        Ok(())
    }

    async fn save_water_conditions(
        &self,
        conditions: &WaterConditions,
    ) -> Result<(), StorageError> {
        let timestamp = format_utc(&conditions.timestamp);
        let mut tx = self.begin().await?;

        let newer: Option<(String,)> = sqlx::query_as(
            "SELECT timestamp FROM water_conditions \
             WHERE location_id = ? AND timestamp > ? LIMIT 1",
        )
        .bind(&conditions.location_id)
        .bind(&timestamp)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StorageError::database(database::get("water_conditions")))?;

        if let Some((existing,)) = newer {
            debug!(
                "Keeping conditions for {} from {}, ignoring older {}",
                conditions.location_id, existing, timestamp
            );
            return Ok(());
        }

        // One row per location
        sqlx::query("DELETE FROM water_conditions WHERE location_id = ?")
            .bind(&conditions.location_id)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::database(database::delete("water_conditions")))?;

        sqlx::query(&format!(
            "INSERT INTO water_conditions ({CONDITIONS_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&conditions.location_id)
        .bind(&timestamp)
        .bind(conditions.water_temperature.value)
        .bind(&conditions.water_temperature.unit)
        .bind(conditions.wave_height.value)
        .bind(&conditions.wave_height.unit)
        .bind(conditions.wave_period.value)
        .bind(&conditions.wave_period.unit)
        .bind(conditions.wave_direction.value)
        .bind(&conditions.wave_direction.unit)
        .bind(conditions.wind_speed.value)
        .bind(&conditions.wind_speed.unit)
        .bind(conditions.wind_direction.value)
        .bind(&conditions.wind_direction.unit)
        .execute(&mut *tx)
        .await
        .map_err(StorageError::database(database::insert("water_conditions")))?;

        tx.commit()
            .await
            .map_err(StorageError::database(database::transaction()))?;
        Ok(())
    }

    async fn get_water_conditions(
        &self,
        location_id: &str,
    ) -> Result<Option<WaterConditions>, StorageError> {
        let row = sqlx::query_as::<_, WaterConditionsRow>(&format!(
            "SELECT {CONDITIONS_COLUMNS} FROM water_conditions WHERE location_id = ?"
        ))
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::database(database::get("water_conditions")))?;

        row.map(WaterConditions::try_from).transpose()
    }

    async fn get_all_water_conditions(
        &self,
    ) -> Result<HashMap<String, WaterConditions>, StorageError> {
        let rows = sqlx::query_as::<_, WaterConditionsRow>(&format!(
            "SELECT {CONDITIONS_COLUMNS} FROM water_conditions"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::database(database::get("water_conditions")))?;

        rows.into_iter()
            .map(|row| {
                let conditions = WaterConditions::try_from(row)?;
                Ok((conditions.location_id.clone(), conditions))
            })
            .collect()
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::SqliteStore;
    use crate::models::{Observation, WaterConditions};
    use crate::storage::CacheStore;

    fn conditions(location_id: &str, minutes: i64) -> WaterConditions {
        WaterConditions {
            location_id: location_id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 17, 12, 0, 0).unwrap()
                + Duration::minutes(minutes),
            water_temperature: Observation::new(15.0 + minutes as f64, "degC"),
            wave_height: Observation::new(1.2, "m"),
            wave_period: Observation::new(8.0, "s"),
            wave_direction: Observation::new(270.0, "deg"),
            wind_speed: Observation::new(5.1, "m/s"),
            wind_direction: Observation::new(250.0, "deg"),
        }
    }

    async fn row_count(store: &SqliteStore, location_id: &str) -> i64 {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM water_conditions WHERE location_id = ?")
                .bind(location_id)
                .fetch_one(&store.pool)
                .await
                .unwrap();
        count
    }

    #[tokio::test]
    async fn test_conditions_keep_one_row_per_location() {
        let store = SqliteStore::open_in_memory().await.unwrap();

        for minutes in [0, 10, 20, 5] {
            store
                .save_water_conditions(&conditions("a", minutes))
                .await
                .unwrap();
        }
        store.save_water_conditions(&conditions("b", 0)).await.unwrap();

        assert_eq!(row_count(&store, "a").await, 1);
        assert_eq!(row_count(&store, "b").await, 1);

        let latest = store.get_water_conditions("a").await.unwrap().unwrap();
        assert_eq!(latest, conditions("a", 20));
        assert_eq!(store.get_all_water_conditions().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resaving_same_snapshot_replaces_row() {
        let store = SqliteStore::open_in_memory().await.unwrap();

        let mut snapshot = conditions("a", 0);
        store.save_water_conditions(&snapshot).await.unwrap();
        snapshot.wind_speed = Observation::new(7.5, "m/s");
        store.save_water_conditions(&snapshot).await.unwrap();

        assert_eq!(row_count(&store, "a").await, 1);
        let stored = store.get_water_conditions("a").await.unwrap().unwrap();
        assert_eq!(stored.wind_speed.value, 7.5);
    }
}
