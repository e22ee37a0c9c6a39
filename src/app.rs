use crate::config::Config;
use crate::datasources::{
    Clock, ConfiguredLocation, ForecastProvider, Geocoder, LocationProvider, OpenWeatherMapClient,
    SystemClock,
};
use crate::db::{Database, Outbox};
use crate::error::{Result, UmbrellaError};
use crate::logic::{
    spawn_location_updates, LocationChangeReactor, LocationUpdateSettings, ReminderScheduler,
    Reschedule, SchedulerSettings,
};
use crate::models::{
    hour_start, Coordinates, ForecastOutcome, NotificationPreference, ScheduledReminder,
    TimeOfDay, INFO_THRESHOLD,
};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub preference: NotificationPreference,
    pub pending: Vec<ScheduledReminder>,
    pub outcome: ForecastOutcome,
    pub forecast_starts_at: Option<DateTime<Utc>>,
}

/// Wires the preference store, the outbox and the forecast services together
pub struct App {
    pub config: Config,
    pub db: Database,
    outbox: Outbox,
    geocoder: Arc<dyn Geocoder>,
    scheduler: Arc<ReminderScheduler>,
}

impl App {
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let client = Arc::new(OpenWeatherMapClient::new(
            config.openweathermap.clone(),
            config.schedule.fetch_timeout(),
        )?);

        Ok(Self::with_services(
            config,
            db,
            client.clone(),
            client,
            Arc::new(SystemClock),
        ))
    }

    pub fn with_services(
        config: Config,
        db: Database,
        forecast: Arc<dyn ForecastProvider>,
        geocoder: Arc<dyn Geocoder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let outbox = Outbox::new(db.clone());
        let scheduler = Arc::new(ReminderScheduler::new(
            forecast,
            Arc::new(outbox.clone()),
            clock,
            SchedulerSettings::from_config(&config),
        ));

        Self {
            config,
            db,
            outbox,
            geocoder,
            scheduler,
        }
    }

    pub fn reactor(&self) -> LocationChangeReactor {
        LocationChangeReactor::new(
            self.db.clone(),
            self.geocoder.clone(),
            self.scheduler.clone(),
            self.config.schedule.fetch_timeout(),
        )
    }

    /// Stored preference, created with the configured default time on first use
    pub fn preference(&self) -> Result<NotificationPreference> {
        self.db.ensure_preference(self.config.reminder.default_time)
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<Reschedule> {
        let pref = self.preference()?;
        self.db.save_schedule(enabled, pref.time_of_day)?;
        tracing::info!(enabled, "Reminder preference updated");
        self.reschedule_stored().await
    }

    pub async fn set_time(&self, time_of_day: TimeOfDay) -> Result<Reschedule> {
        let pref = self.preference()?;
        self.db.save_schedule(pref.enabled, time_of_day)?;
        tracing::info!(time = %time_of_day, "Reminder time updated");
        self.reschedule_stored().await
    }

    /// Foreground location update, handled exactly like a background one
    pub async fn set_location(&self, coordinates: Coordinates) -> Result<Reschedule> {
        if !coordinates.is_valid() {
            return Err(UmbrellaError::InvalidData(format!(
                "coordinates out of range: {}",
                coordinates
            )));
        }
        self.preference()?;

        self.reactor()
            .handle(Ok(coordinates))
            .await
            .ok_or_else(|| UmbrellaError::InvalidData("location could not be saved".into()))
    }

    pub async fn refresh(&self) -> Result<Reschedule> {
        self.reschedule_stored().await
    }

    async fn reschedule_stored(&self) -> Result<Reschedule> {
        let pref = self.preference()?;
        Ok(self.scheduler.reschedule(&pref).await)
    }

    /// Remove reminders whose trigger has passed so they can be shown
    pub fn deliver_due(&self) -> Result<Vec<ScheduledReminder>> {
        let due = self.outbox.take_due(Utc::now())?;
        for reminder in &due {
            tracing::info!(title = %reminder.title, "Delivering reminder");
        }
        Ok(due)
    }

    pub async fn status(&self) -> Result<StatusSnapshot> {
        let preference = self.preference()?;
        let pending = self.outbox.pending()?;
        let assessment = self.scheduler.assess(&preference).await;
        Ok(StatusSnapshot {
            preference,
            pending,
            outcome: assessment.outcome,
            forecast_starts_at: assessment.starts_at,
        })
    }

    pub async fn status_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.status().await?)?)
    }

    pub async fn status_report(&self) -> Result<String> {
        let StatusSnapshot {
            preference: pref,
            pending,
            outcome,
            forecast_starts_at,
        } = self.status().await?;

        let mut out = String::new();
        let _ = writeln!(
            out,
            "Reminders:  {} at {}",
            if pref.enabled { "enabled" } else { "disabled" },
            pref.time_of_day
        );
        let _ = match &pref.location {
            Some(location) => writeln!(
                out,
                "Location:   {} ({})",
                location.name, location.coordinates
            ),
            None => writeln!(out, "Location:   {}", pref.location_text()),
        };
        match pending.first() {
            Some(reminder) => {
                let _ = writeln!(
                    out,
                    "Pending:    {}{}",
                    reminder.local_trigger().format("%a %b %-d %-I:%M %p"),
                    if reminder.is_due(Utc::now()) { " (due)" } else { "" }
                );
                let _ = writeln!(out, "            {}", reminder.body);
            }
            None => {
                let _ = writeln!(out, "Pending:    none");
            }
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", outcome.headline());

        if let (ForecastOutcome::Available(summary), Some(starts_at)) =
            (&outcome, forecast_starts_at)
        {
            if let Some(window) = summary.risk_window {
                let _ = writeln!(
                    out,
                    "Rain window spans {} h, {:.2} in expected",
                    window.hours(),
                    summary.total_volume_inches()
                );
            }
            let threshold = self.scheduler.settings().threshold;
            for (offset, (pop, inches)) in summary
                .probabilities
                .iter()
                .zip(&summary.volumes_inches)
                .enumerate()
            {
                let marker = if *pop >= threshold {
                    "☂"
                } else if *pop >= INFO_THRESHOLD {
                    "·"
                } else {
                    ""
                };
                let _ = writeln!(
                    out,
                    "  {:>8}  {:>3.0}%  {:.2} in  {}",
                    TimeOfDay::of(&hour_start(starts_at, offset as u32).with_timezone(&Local))
                        .to_string(),
                    pop * 100.0,
                    inches,
                    marker
                );
            }
        } else if let ForecastOutcome::Unavailable(reason) = &outcome {
            let _ = writeln!(out, "  {}", reason);
        }

        Ok(out)
    }

    /// Background daemon: keeps the reminder current until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        let startup = self.refresh().await?;
        println!("{}", describe(&startup));

        let location: Arc<dyn LocationProvider> =
            Arc::new(ConfiguredLocation::new(self.config.location.as_ref()));
        let (tx, rx) = mpsc::channel(16);
        let updates = spawn_location_updates(
            location,
            LocationUpdateSettings::from_config(&self.config.schedule),
            tx,
        );
        let reactor = tokio::spawn(self.reactor().run(rx));

        let mut refresh = tokio::time::interval(self.config.schedule.refresh_interval());
        let mut delivery = tokio::time::interval(self.config.schedule.delivery_poll());
        // Both intervals fire immediately; startup already rescheduled
        refresh.tick().await;

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        tracing::info!("Umbrella daemon started");

        loop {
            tokio::select! {
                _ = refresh.tick() => {
                    match self.refresh().await {
                        Ok(result) => tracing::debug!("{}", describe(&result)),
                        Err(e) => tracing::warn!("Scheduled refresh failed: {}", e),
                    }
                }
                _ = delivery.tick() => {
                    match self.deliver_due() {
                        Ok(due) => {
                            for reminder in due {
                                println!("{}", reminder.title);
                                println!("{}", reminder.body);
                            }
                        }
                        Err(e) => tracing::warn!("Reminder delivery failed: {}", e),
                    }
                }
                result = &mut shutdown => {
                    if let Err(e) = result {
                        tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    }
                    break;
                }
            }
        }

        if let Some(outcome) = self.scheduler.last_outcome().await {
            tracing::info!(headline = outcome.headline(), "Shutting down");
        }
        updates.abort();
        reactor.abort();
        Ok(())
    }
}

/// Validate config and test the OpenWeatherMap connection
pub async fn check(config: &Config, coordinates: Coordinates) -> Result<()> {
    println!("Config OK");

    let client = OpenWeatherMapClient::new(
        config.openweathermap.clone(),
        config.schedule.fetch_timeout(),
    )?;
    match client.test_connection(&coordinates).await {
        Ok(true) => println!("OpenWeatherMap: OK"),
        Ok(false) => {
            println!("OpenWeatherMap: REJECTED (check api_key)");
            return Err(UmbrellaError::FetchFailed(
                "OpenWeatherMap rejected the request".into(),
            ));
        }
        Err(e) => {
            println!("OpenWeatherMap: OFFLINE");
            return Err(e);
        }
    }

    match client.fetch_hourly_forecast(&coordinates).await {
        Ok(forecast) => println!("One Call hourly forecast: {} hours", forecast.samples.len()),
        Err(e) => println!("One Call hourly forecast: FAILED ({})", e),
    }

    Ok(())
}

/// One-line summary of a reschedule pass
pub fn describe(result: &Reschedule) -> String {
    match (&result.outcome, &result.scheduled) {
        (_, Some(reminder)) => format!(
            "{} Reminder set for {}.",
            result.outcome.headline(),
            reminder.local_trigger().format("%a %-I:%M %p")
        ),
        (ForecastOutcome::Unavailable(reason), None) => {
            format!("{} ({})", result.outcome.headline(), reason)
        }
        (ForecastOutcome::Available(_), None) => result.outcome.headline().to_string(),
    }
}
