use super::reactor::LocationEvent;
use crate::config::ScheduleConfig;
use crate::datasources::LocationProvider;
use crate::models::Coordinates;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
pub struct LocationUpdateSettings {
    pub interval: Duration,
    pub min_distance_km: f64,
}

impl LocationUpdateSettings {
    pub fn from_config(schedule: &ScheduleConfig) -> Self {
        Self {
            interval: schedule.location_interval(),
            min_distance_km: schedule.location_distance_km(),
        }
    }
}

impl Default for LocationUpdateSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            min_distance_km: 1.0,
        }
    }
}

/// Poll the location provider in the background and forward meaningful changes
///
/// The first sample is always forwarded; later samples only once they are at
/// least `min_distance_km` from the last forwarded one. Errors are forwarded
/// as-is. The task ends when the receiver is dropped.
pub fn spawn_location_updates(
    provider: Arc<dyn LocationProvider>,
    settings: LocationUpdateSettings,
    tx: mpsc::Sender<LocationEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(settings.interval);
        let mut last_sent: Option<Coordinates> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tx.closed() => break,
            }

            let event = match provider.current_location().await {
                Ok(coordinates) => {
                    if let Some(previous) = last_sent {
                        let moved = previous.distance_km(&coordinates);
                        if moved < settings.min_distance_km {
                            tracing::trace!(moved_km = moved, "Location unchanged");
                            continue;
                        }
                    }
                    last_sent = Some(coordinates);
                    Ok(coordinates)
                }
                Err(e) => Err(e),
            };

            if tx.send(event).await.is_err() {
                break;
            }
        }

        tracing::debug!("Location updates stopped");
    })
}
