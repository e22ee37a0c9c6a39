use super::scheduler::{ReminderScheduler, Reschedule};
use crate::datasources::{Geocoder, LocationError};
use crate::db::Database;
use crate::models::{Coordinates, Location, UNKNOWN_LOCATION_NAME};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub type LocationEvent = Result<Coordinates, LocationError>;

/// Applies location changes to the stored preference and reschedules
pub struct LocationChangeReactor {
    db: Database,
    geocoder: Arc<dyn Geocoder>,
    scheduler: Arc<ReminderScheduler>,
    geocode_timeout: Duration,
}

impl LocationChangeReactor {
    pub fn new(
        db: Database,
        geocoder: Arc<dyn Geocoder>,
        scheduler: Arc<ReminderScheduler>,
        geocode_timeout: Duration,
    ) -> Self {
        Self {
            db,
            geocoder,
            scheduler,
            geocode_timeout,
        }
    }

    pub async fn handle(&self, event: LocationEvent) -> Option<Reschedule> {
        let coordinates = match event {
            Ok(coordinates) => coordinates,
            Err(e) => {
                tracing::warn!("Location update failed: {}", e);
                return None;
            }
        };

        let location = Location::new(coordinates, self.place_name(&coordinates).await);
        tracing::info!(location = %location.name, %coordinates, "Location changed");

        if let Err(e) = self.db.save_location(&location) {
            tracing::error!("Failed to save location: {}", e);
            return None;
        }

        // Reschedule from the stored preference so concurrent edits are not lost
        let pref = match self.db.load_preference() {
            Ok(Some(pref)) => pref,
            Ok(None) => {
                tracing::error!("Preference missing after saving location");
                return None;
            }
            Err(e) => {
                tracing::error!("Failed to load preference: {}", e);
                return None;
            }
        };

        Some(self.scheduler.reschedule(&pref).await)
    }

    /// Handle events until every sender is dropped
    pub async fn run(self, mut rx: mpsc::Receiver<LocationEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        tracing::debug!("Location channel closed");
    }

    async fn place_name(&self, coordinates: &Coordinates) -> String {
        match tokio::time::timeout(
            self.geocode_timeout,
            self.geocoder.reverse_geocode(coordinates),
        )
        .await
        {
            Ok(Ok(name)) => name,
            Ok(Err(e)) => {
                tracing::warn!("Reverse geocoding failed: {}", e);
                UNKNOWN_LOCATION_NAME.into()
            }
            Err(_) => {
                tracing::warn!("Reverse geocoding timed out");
                UNKNOWN_LOCATION_NAME.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::scheduler::SchedulerSettings;
    use crate::logic::testing::{rainy, FakeForecast, FakeGeocoder, FakeResponse, FixedClock, RecordingSink};
    use crate::models::TimeOfDay;
    use std::sync::atomic::Ordering;

    struct Harness {
        db: Database,
        geocoder: Arc<FakeGeocoder>,
        forecast: Arc<FakeForecast>,
        sink: Arc<RecordingSink>,
        reactor: LocationChangeReactor,
    }

    fn harness(geocoder: FakeGeocoder) -> Harness {
        let db = Database::open_in_memory().unwrap();
        let geocoder = Arc::new(geocoder);
        let forecast = Arc::new(FakeForecast::new(FakeResponse::Forecast(rainy())));
        let sink = Arc::new(RecordingSink::default());
        let scheduler = Arc::new(ReminderScheduler::new(
            forecast.clone(),
            sink.clone(),
            Arc::new(FixedClock::at(2024, 5, 1, 7, 30)),
            SchedulerSettings::default(),
        ));
        let reactor = LocationChangeReactor::new(
            db.clone(),
            geocoder.clone(),
            scheduler,
            Duration::from_millis(200),
        );
        Harness {
            db,
            geocoder,
            forecast,
            sink,
            reactor,
        }
    }

    fn newark() -> Coordinates {
        Coordinates::new(39.68, -75.75)
    }

    #[tokio::test]
    async fn location_error_changes_nothing() {
        let h = harness(FakeGeocoder::named("Newark, Delaware, US"));

        let result = h.reactor.handle(Err(LocationError::PermissionDenied)).await;

        assert!(result.is_none());
        assert!(h.db.load_preference().unwrap().is_none());
        assert_eq!(h.geocoder.calls.load(Ordering::SeqCst), 0);
        assert!(h.sink.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_location_is_named_saved_and_rescheduled() {
        let h = harness(FakeGeocoder::named("Newark, Delaware, US"));
        h.db.save_schedule(true, TimeOfDay::new(7, 45).unwrap()).unwrap();

        let result = h.reactor.handle(Ok(newark())).await.unwrap();

        let stored = h.db.load_preference().unwrap().unwrap();
        let location = stored.location.unwrap();
        assert_eq!(location.name, "Newark, Delaware, US");
        assert_eq!(location.coordinates, newark());

        assert!(result.scheduled.is_some());
        assert_eq!(h.sink.cancel_count(), 1);
        assert_eq!(h.forecast.calls.lock().unwrap().as_slice(), &[newark()]);
    }

    #[tokio::test]
    async fn geocode_failure_uses_placeholder_and_still_reschedules() {
        let h = harness(FakeGeocoder::failing());
        h.db.save_schedule(true, TimeOfDay::default()).unwrap();

        let result = h.reactor.handle(Ok(newark())).await.unwrap();

        let stored = h.db.load_preference().unwrap().unwrap();
        assert_eq!(stored.location.unwrap().name, UNKNOWN_LOCATION_NAME);
        assert!(result.outcome.is_available());
        assert_eq!(h.sink.pending().len(), 1);
    }

    #[tokio::test]
    async fn reschedule_uses_stored_preference() {
        let h = harness(FakeGeocoder::named("Newark"));
        // Disabled in the store, so nothing may be scheduled despite rain
        h.db.save_schedule(false, TimeOfDay::default()).unwrap();

        let result = h.reactor.handle(Ok(newark())).await.unwrap();

        assert!(result.outcome.summary().unwrap().needs_umbrella);
        assert!(result.scheduled.is_none());
        assert!(h.sink.scheduled().is_empty());
    }

    #[tokio::test]
    async fn first_location_without_stored_preference_is_disabled() {
        let h = harness(FakeGeocoder::named("Newark"));

        let result = h.reactor.handle(Ok(newark())).await.unwrap();

        let stored = h.db.load_preference().unwrap().unwrap();
        assert!(!stored.enabled);
        assert_eq!(stored.time_of_day, TimeOfDay::default());
        assert!(result.scheduled.is_none());
    }

    #[tokio::test]
    async fn run_drains_channel_until_closed() {
        let h = harness(FakeGeocoder::named("Somewhere"));
        h.db.save_schedule(true, TimeOfDay::default()).unwrap();
        let (tx, rx) = mpsc::channel(4);

        tx.send(Err(LocationError::Unavailable("gps off".into())))
            .await
            .unwrap();
        tx.send(Ok(newark())).await.unwrap();
        tx.send(Ok(Coordinates::new(40.71, -74.01))).await.unwrap();
        drop(tx);

        h.reactor.run(rx).await;

        assert_eq!(h.geocoder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.sink.cancel_count(), 2);
        assert_eq!(h.sink.pending().len(), 1);
        let stored = h.db.load_preference().unwrap().unwrap();
        assert_eq!(
            stored.location.unwrap().coordinates,
            Coordinates::new(40.71, -74.01)
        );
    }
}
