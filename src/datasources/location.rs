use super::{LocationError, LocationProvider};
use crate::config::LocationConfig;
use crate::models::Coordinates;
use async_trait::async_trait;

/// Location provider backed by the coordinates in the config file
pub struct ConfiguredLocation {
    coordinates: Option<Coordinates>,
}

impl ConfiguredLocation {
    pub fn new(config: Option<&LocationConfig>) -> Self {
        Self {
            coordinates: config.map(LocationConfig::coordinates),
        }
    }
}

#[async_trait]
impl LocationProvider for ConfiguredLocation {
    async fn current_location(&self) -> Result<Coordinates, LocationError> {
        self.coordinates.ok_or_else(|| {
            LocationError::Unavailable("no location configured; use `umbrella locate`".into())
        })
    }
}
