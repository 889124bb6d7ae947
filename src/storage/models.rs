use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use sqlx::FromRow;

use super::StorageError;
use crate::models::{Location, LocationGroup, Observation, Region, WaterConditions};

/// Fixed-width UTC text so that lexical order is chronological
pub fn format_utc(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_utc(column: &str, value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidRow(format!("{column} '{value}': {e}")))
}

pub fn parse_fixed(column: &str, value: &str) -> Result<DateTime<FixedOffset>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| StorageError::InvalidRow(format!("{column} '{value}': {e}")))
}

/// A row of the `temperature` or `discharge` table
#[derive(Debug, Clone, FromRow)]
pub struct SeriesRow {
    pub id: i64,

    /// Value of the series when it was saved
    pub value: f64,

    /// When the row was written
    pub date_time: String,

    /// Upstream timestamp of the value, offset preserved
    pub last_updated: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct LocationRow {
    pub id: String,
    pub name: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub ndbc_station_id: String,
    pub is_favorite: bool,
    pub last_updated: String,
}

impl LocationRow {
    /// Group memberships live in `location_group_members`, not on the row
    pub fn into_location(self, user_groups: Vec<String>) -> Result<Location, StorageError> {
        let last_updated = parse_utc("locations.last_updated", &self.last_updated)?;
        // Region parsing is infallible; unknown names become Other
        let region = self.region.parse::<Region>().unwrap_or(Region::Other);

        Ok(Location {
            id: self.id,
            name: self.name,
            region,
            latitude: self.latitude,
            longitude: self.longitude,
            ndbc_station_id: self.ndbc_station_id,
            is_favorite: self.is_favorite,
            user_groups,
            last_updated,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LocationGroupRow {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl LocationGroupRow {
    pub fn into_group(self, location_ids: Vec<String>) -> Result<LocationGroup, StorageError> {
        Ok(LocationGroup {
            created_at: parse_utc("location_groups.created_at", &self.created_at)?,
            updated_at: parse_utc("location_groups.updated_at", &self.updated_at)?,
            id: self.id,
            name: self.name,
            location_ids,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MembershipRow {
    pub group_id: String,
    pub location_id: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct WaterConditionsRow {
    pub location_id: String,
    pub timestamp: String,
    pub water_temperature: f64,
    pub water_temperature_unit: String,
    pub wave_height: f64,
    pub wave_height_unit: String,
    pub wave_period: f64,
    pub wave_period_unit: String,
    pub wave_direction: f64,
    pub wave_direction_unit: String,
    pub wind_speed: f64,
    pub wind_speed_unit: String,
    pub wind_direction: f64,
    pub wind_direction_unit: String,
}

impl TryFrom<WaterConditionsRow> for WaterConditions {
    type Error = StorageError;

    fn try_from(row: WaterConditionsRow) -> Result<Self, Self::Error> {
        Ok(WaterConditions {
            timestamp: parse_utc("water_conditions.timestamp", &row.timestamp)?,
            location_id: row.location_id,
            water_temperature: Observation::new(row.water_temperature, row.water_temperature_unit),
            wave_height: Observation::new(row.wave_height, row.wave_height_unit),
            wave_period: Observation::new(row.wave_period, row.wave_period_unit),
            wave_direction: Observation::new(row.wave_direction, row.wave_direction_unit),
            wind_speed: Observation::new(row.wind_speed, row.wind_speed_unit),
            wind_direction: Observation::new(row.wind_direction, row.wind_direction_unit),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_utc_text_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2024, 5, 17, 14, 50, 0).unwrap();
        let later = earlier + chrono::Duration::milliseconds(1);

        assert!(format_utc(&earlier) < format_utc(&later));
        assert_eq!(parse_utc("t", &format_utc(&later)).unwrap(), later);
    }

    #[test]
    fn test_utc_text_keeps_nanoseconds() {
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 14, 50, 43).unwrap()
            + chrono::Duration::nanoseconds(936_810_175);

        assert_eq!(format_utc(&at), "2024-05-17T14:50:43.936810175Z");
        assert_eq!(parse_utc("t", &format_utc(&at)).unwrap(), at);
    }

    #[test]
    fn test_bad_timestamp_is_invalid_row() {
        assert!(matches!(
            parse_utc("t", "yesterday"),
            Err(StorageError::InvalidRow(_))
        ));
    }

    #[test]
    fn test_unknown_region_loads_as_other() {
        let row = LocationRow {
            id: "a".to_string(),
            name: "Somewhere".to_string(),
            region: "Atlantis".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            ndbc_station_id: "00000".to_string(),
            is_favorite: false,
            last_updated: "2024-05-17T14:50:00Z".to_string(),
        };

        let location = row.into_location(vec!["g".to_string()]).unwrap();
        assert_eq!(location.region, Region::Other);
        assert_eq!(location.user_groups, vec!["g"]);
    }
}
