//! Recording fakes for scheduler and reactor tests.

use crate::datasources::{Clock, ForecastProvider, Geocoder, NotificationSink};
use crate::error::{Result, UmbrellaError};
use crate::models::{
    Coordinates, ForecastSample, HourlyForecast, ReminderHandle, ScheduledReminder,
};
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn hourly(pops: &[f64]) -> HourlyForecast {
    let starts_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    HourlyForecast {
        fetched_at: starts_at,
        starts_at,
        samples: pops
            .iter()
            .enumerate()
            .map(|(h, &p)| ForecastSample::new(h as u32, p, if p >= 0.5 { 1.0 } else { 0.0 }))
            .collect(),
    }
}

/// 12 hours with rain likely at offsets 2 and 3
pub fn rainy() -> HourlyForecast {
    hourly(&[0.1, 0.1, 0.6, 0.7, 0.2, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
}

pub fn dry() -> HourlyForecast {
    hourly(&[0.1; 12])
}

pub enum FakeResponse {
    Forecast(HourlyForecast),
    Delayed(HourlyForecast, Duration),
    Fail,
    Hang,
}

pub struct FakeForecast {
    response: Mutex<FakeResponse>,
    pub calls: Mutex<Vec<Coordinates>>,
}

impl FakeForecast {
    pub fn new(response: FakeResponse) -> Self {
        Self {
            response: Mutex::new(response),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, response: FakeResponse) {
        *self.response.lock().unwrap() = response;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ForecastProvider for FakeForecast {
    async fn fetch_hourly(&self, coordinates: &Coordinates) -> Result<HourlyForecast> {
        self.calls.lock().unwrap().push(*coordinates);
        let (delay, result) = match &*self.response.lock().unwrap() {
            FakeResponse::Forecast(forecast) => (Duration::ZERO, Ok(forecast.clone())),
            FakeResponse::Delayed(forecast, delay) => (*delay, Ok(forecast.clone())),
            FakeResponse::Fail => (
                Duration::ZERO,
                Err(UmbrellaError::FetchFailed("connection refused".into())),
            ),
            FakeResponse::Hang => (
                Duration::from_secs(3600),
                Err(UmbrellaError::FetchFailed("hung".into())),
            ),
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

pub struct FakeGeocoder {
    name: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeGeocoder {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            name: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn reverse_geocode(&self, _coordinates: &Coordinates) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.name
            .clone()
            .ok_or_else(|| UmbrellaError::GeocodeFailed("no results".into()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    CancelAll,
    Schedule(ScheduledReminder),
}

/// Records every call and models the pending set like the real delivery subsystem
#[derive(Default)]
pub struct RecordingSink {
    pub calls: Mutex<Vec<SinkCall>>,
    pub pending: Mutex<Vec<ScheduledReminder>>,
    pub fail_cancel: bool,
    pub fail_schedule: bool,
}

impl RecordingSink {
    pub fn cancel_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, SinkCall::CancelAll))
            .count()
    }

    pub fn scheduled(&self) -> Vec<ScheduledReminder> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                SinkCall::Schedule(r) => Some(r.clone()),
                SinkCall::CancelAll => None,
            })
            .collect()
    }

    pub fn pending(&self) -> Vec<ScheduledReminder> {
        self.pending.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn cancel_all(&self) -> Result<()> {
        self.calls.lock().unwrap().push(SinkCall::CancelAll);
        if self.fail_cancel {
            return Err(UmbrellaError::InvalidData("cancel rejected".into()));
        }
        self.pending.lock().unwrap().clear();
        Ok(())
    }

    async fn schedule(&self, reminder: &ScheduledReminder) -> Result<ReminderHandle> {
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::Schedule(reminder.clone()));
        if self.fail_schedule {
            return Err(UmbrellaError::InvalidData("schedule rejected".into()));
        }
        let mut pending = self.pending.lock().unwrap();
        pending.clear();
        pending.push(reminder.clone());
        Ok(self.calls.lock().unwrap().len() as ReminderHandle)
    }
}

pub struct FixedClock(pub DateTime<Local>);

impl FixedClock {
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        Self(
            Local
                .with_ymd_and_hms(year, month, day, hour, minute, 0)
                .earliest()
                .unwrap(),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}
