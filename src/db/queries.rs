use crate::db::Database;
use crate::error::Result;
use crate::models::{Coordinates, Location, NotificationPreference, TimeOfDay};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::warn;

// Preference Queries

impl Database {
    /// Load the stored preference, or `None` if nothing has been saved yet
    pub fn load_preference(&self) -> Result<Option<NotificationPreference>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM preferences WHERE id = 1",
                [],
                row_to_preference,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Create the preference row with the given default time if none exists yet
    pub fn ensure_preference(&self, default_time: TimeOfDay) -> Result<NotificationPreference> {
        if let Some(pref) = self.load_preference()? {
            return Ok(pref);
        }

        let pref = NotificationPreference {
            time_of_day: default_time,
            ..NotificationPreference::default()
        };
        self.save_schedule(pref.enabled, pref.time_of_day)?;
        Ok(pref)
    }

    pub fn save_schedule(&self, enabled: bool, time_of_day: TimeOfDay) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO preferences (id, enabled, notify_hour, notify_minute, updated_at)
                VALUES (1, ?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    enabled = excluded.enabled,
                    notify_hour = excluded.notify_hour,
                    notify_minute = excluded.notify_minute,
                    updated_at = excluded.updated_at
                "#,
                params![
                    enabled,
                    time_of_day.hour(),
                    time_of_day.minute(),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn save_location(&self, location: &Location) -> Result<()> {
        let default_time = TimeOfDay::default();
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO preferences
                    (id, enabled, notify_hour, notify_minute, latitude, longitude, location_name, updated_at)
                VALUES (1, 0, ?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    latitude = excluded.latitude,
                    longitude = excluded.longitude,
                    location_name = excluded.location_name,
                    updated_at = excluded.updated_at
                "#,
                params![
                    default_time.hour(),
                    default_time.minute(),
                    location.coordinates.latitude,
                    location.coordinates.longitude,
                    location.name,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }
}

fn row_to_preference(row: &Row) -> rusqlite::Result<NotificationPreference> {
    let hour: u8 = row.get("notify_hour")?;
    let minute: u8 = row.get("notify_minute")?;
    let latitude: Option<f64> = row.get("latitude")?;
    let longitude: Option<f64> = row.get("longitude")?;
    let location_name: Option<String> = row.get("location_name")?;

    let time_of_day = TimeOfDay::new(hour, minute).unwrap_or_else(|_| {
        warn!(hour, minute, "Invalid notify time in database, defaulting to 9:00 AM");
        TimeOfDay::default()
    });

    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Location::new(
            Coordinates::new(latitude, longitude),
            location_name.unwrap_or_default(),
        )),
        _ => None,
    };

    Ok(NotificationPreference {
        enabled: row.get("enabled")?,
        time_of_day,
        location,
    })
}
