pub mod location;
pub mod openweathermap;

pub use location::ConfiguredLocation;
pub use openweathermap::OpenWeatherMapClient;

use crate::error::Result;
use crate::models::{Coordinates, HourlyForecast, ReminderHandle, ScheduledReminder};
use async_trait::async_trait;
use chrono::{DateTime, Local};

/// Source of hourly precipitation forecasts
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn fetch_hourly(&self, coordinates: &Coordinates) -> Result<HourlyForecast>;
}

/// Turns coordinates into a human-readable place name
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse_geocode(&self, coordinates: &Coordinates) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Device location, sampled on demand
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> std::result::Result<Coordinates, LocationError>;
}

/// Delivery subsystem holding at most one pending reminder for this app
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn cancel_all(&self) -> Result<()>;

    /// Schedule `reminder`, replacing anything still pending
    async fn schedule(&self, reminder: &ScheduledReminder) -> Result<ReminderHandle>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
