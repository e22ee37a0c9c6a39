use super::evaluator::ForecastEvaluator;
use super::trigger::next_trigger;
use crate::config::Config;
use crate::datasources::{Clock, ForecastProvider, NotificationSink};
use crate::error::UmbrellaError;
use crate::models::{
    ForecastOutcome, HourlyForecast, NotificationPreference, RiskSummary, RiskWindow,
    ScheduledReminder, TimeOfDay, Unavailable, DEFAULT_REMINDER_TITLE, UMBRELLA_THRESHOLD,
};
use chrono::{DateTime, Local, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub threshold: f64,
    pub title: String,
    pub fetch_timeout: Duration,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            threshold: config.reminder.threshold,
            title: config.reminder.title.clone(),
            fetch_timeout: config.schedule.fetch_timeout(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            threshold: UMBRELLA_THRESHOLD,
            title: DEFAULT_REMINDER_TITLE.into(),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Fresh outcome plus the instant of hour offset 0 when a forecast was fetched
#[derive(Debug, Clone)]
pub struct Assessment {
    pub outcome: ForecastOutcome,
    pub starts_at: Option<DateTime<Utc>>,
}

/// Result of one reschedule pass
#[derive(Debug, Clone)]
pub struct Reschedule {
    pub outcome: ForecastOutcome,
    pub scheduled: Option<ScheduledReminder>,
}

/// Keeps the delivery subsystem holding at most one reminder that matches the
/// current preference and forecast.
///
/// Every pass cancels whatever is pending before deciding whether to schedule
/// again, so a failed or missing forecast leaves nothing pending.
pub struct ReminderScheduler {
    forecast: Arc<dyn ForecastProvider>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    evaluator: ForecastEvaluator,
    settings: SchedulerSettings,
    in_flight: Mutex<()>,
    last_outcome: RwLock<Option<ForecastOutcome>>,
}

impl ReminderScheduler {
    pub fn new(
        forecast: Arc<dyn ForecastProvider>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            forecast,
            sink,
            clock,
            evaluator: ForecastEvaluator::new(settings.threshold),
            settings,
            in_flight: Mutex::new(()),
            last_outcome: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Cancel the pending reminder and schedule a fresh one if rain is likely
    pub async fn reschedule(&self, pref: &NotificationPreference) -> Reschedule {
        let _serialized = self.in_flight.lock().await;

        let cancelled = match self.sink.cancel_all().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to cancel pending reminders: {}", e);
                false
            }
        };

        let assessed = self.fetch_and_evaluate(pref).await;
        let outcome = match &assessed {
            Ok((_, summary)) => ForecastOutcome::Available(summary.clone()),
            Err(reason) => ForecastOutcome::Unavailable(reason.clone()),
        };

        let scheduled = match assessed {
            Ok((forecast, summary)) if cancelled => self.schedule_if_needed(pref, &forecast, &summary).await,
            Ok(_) => {
                tracing::warn!("Skipping reminder; previous reminder could not be cancelled");
                None
            }
            Err(reason) => {
                tracing::warn!("No reminder scheduled: {}", reason);
                None
            }
        };

        *self.last_outcome.write().await = Some(outcome.clone());

        Reschedule { outcome, scheduled }
    }

    /// Fetch and evaluate without touching the pending reminder
    pub async fn assess(&self, pref: &NotificationPreference) -> Assessment {
        match self.fetch_and_evaluate(pref).await {
            Ok((forecast, summary)) => Assessment {
                outcome: ForecastOutcome::Available(summary),
                starts_at: Some(forecast.starts_at),
            },
            Err(reason) => Assessment {
                outcome: ForecastOutcome::Unavailable(reason),
                starts_at: None,
            },
        }
    }

    pub async fn last_outcome(&self) -> Option<ForecastOutcome> {
        self.last_outcome.read().await.clone()
    }

    async fn fetch_and_evaluate(
        &self,
        pref: &NotificationPreference,
    ) -> Result<(HourlyForecast, RiskSummary), Unavailable> {
        let location = pref.location.as_ref().ok_or(Unavailable::NoLocation)?;

        let fetched = tokio::time::timeout(
            self.settings.fetch_timeout,
            self.forecast.fetch_hourly(&location.coordinates),
        )
        .await;

        let forecast = match fetched {
            Ok(Ok(forecast)) => forecast,
            Ok(Err(e)) => return Err(Unavailable::FetchFailed(e.to_string())),
            Err(_) => {
                return Err(Unavailable::FetchFailed(format!(
                    "timed out after {}s",
                    self.settings.fetch_timeout.as_secs()
                )))
            }
        };

        match self.evaluator.evaluate(&forecast.samples) {
            Ok(summary) => {
                tracing::debug!(
                    location = %location.name,
                    needs_umbrella = summary.needs_umbrella,
                    peak = summary.peak_probability(),
                    "Forecast evaluated"
                );
                Ok((forecast, summary))
            }
            Err(UmbrellaError::Incomplete { received, .. }) => {
                Err(Unavailable::Incomplete { received })
            }
            Err(e) => Err(Unavailable::FetchFailed(e.to_string())),
        }
    }

    async fn schedule_if_needed(
        &self,
        pref: &NotificationPreference,
        forecast: &HourlyForecast,
        summary: &RiskSummary,
    ) -> Option<ScheduledReminder> {
        if !pref.enabled {
            tracing::debug!("Reminders disabled; nothing scheduled");
            return None;
        }

        let window = summary.risk_window?;

        let trigger_at = next_trigger(&self.clock.now(), pref.time_of_day).with_timezone(&Utc);
        let reminder = ScheduledReminder::new(
            trigger_at,
            self.settings.title.clone(),
            self.compose_body(forecast, window),
        );

        match self.sink.schedule(&reminder).await {
            Ok(handle) => {
                tracing::info!(
                    handle,
                    trigger_at = %reminder.local_trigger(),
                    "Umbrella reminder scheduled"
                );
                Some(reminder)
            }
            Err(e) => {
                tracing::error!("Failed to schedule reminder: {}", e);
                None
            }
        }
    }

    /// Body text naming the risk window as local clock times
    ///
    /// The end time is the end of the last risky hour.
    fn compose_body(&self, forecast: &HourlyForecast, window: RiskWindow) -> String {
        let start = forecast.instant_at(window.start).with_timezone(&Local);
        let end = forecast.instant_at(window.end + 1).with_timezone(&Local);

        format!(
            "At least {:.0}% chance of rain from {} to {}.",
            self.settings.threshold * 100.0,
            TimeOfDay::of(&start),
            TimeOfDay::of(&end)
        )
    }
}
