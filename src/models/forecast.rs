use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Number of hourly samples a forecast must carry to be evaluated
pub const FORECAST_HORIZON_HOURS: usize = 12;

pub const MM_PER_INCH: f64 = 25.4;

/// Hourly precipitation forecast, replaced wholesale on every fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub fetched_at: DateTime<Utc>,
    pub starts_at: DateTime<Utc>, // wall-clock instant of hour offset 0
    pub samples: Vec<ForecastSample>,
}

impl HourlyForecast {
    /// Wall-clock instant at which the given hour offset begins
    pub fn instant_at(&self, hour_offset: u32) -> DateTime<Utc> {
        hour_start(self.starts_at, hour_offset)
    }

    pub fn is_complete(&self) -> bool {
        self.samples.len() >= FORECAST_HORIZON_HOURS
    }
}

/// Start of the hour `hour_offset` hours after a forecast's first hour
pub fn hour_start(starts_at: DateTime<Utc>, hour_offset: u32) -> DateTime<Utc> {
    starts_at + Duration::hours(hour_offset as i64)
}

/// A single hour of precipitation forecast
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub hour_offset: u32,
    pub probability_of_precipitation: f64, // 0.0-1.0
    pub volume_mm: f64,                    // rain + snow
}

impl ForecastSample {
    pub fn new(hour_offset: u32, probability_of_precipitation: f64, volume_mm: f64) -> Self {
        Self {
            hour_offset,
            probability_of_precipitation,
            volume_mm,
        }
    }

    pub fn volume_inches(&self) -> f64 {
        mm_to_inches(self.volume_mm)
    }
}

pub fn mm_to_inches(mm: f64) -> f64 {
    mm / MM_PER_INCH
}
