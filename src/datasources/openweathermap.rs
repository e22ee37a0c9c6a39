use super::{ForecastProvider, Geocoder};
use crate::config::OpenWeatherMapConfig;
use crate::error::{Result, UmbrellaError};
use crate::models::{Coordinates, ForecastSample, HourlyForecast};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

pub struct OpenWeatherMapClient {
    client: reqwest::Client,
    config: OpenWeatherMapConfig,
}

// OpenWeatherMap One Call API response structures
#[derive(Debug, Deserialize)]
struct OwmOneCallResponse {
    #[serde(default)]
    hourly: Vec<OwmHourly>,
}

#[derive(Debug, Deserialize)]
struct OwmHourly {
    dt: i64,
    #[serde(default)]
    pop: f64, // probability of precipitation
    #[serde(default)]
    rain: Option<OwmPrecipitation>,
    #[serde(default)]
    snow: Option<OwmPrecipitation>,
}

#[derive(Debug, Deserialize)]
struct OwmPrecipitation {
    #[serde(rename = "1h", default)]
    one_hour: f64,
}

// OpenWeatherMap reverse geocoding response entry
#[derive(Debug, Deserialize)]
struct OwmPlace {
    name: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl OpenWeatherMapClient {
    pub fn new(config: OpenWeatherMapConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Fetch the hourly forecast (48 hours) from the One Call API
    pub async fn fetch_hourly_forecast(&self, coordinates: &Coordinates) -> Result<HourlyForecast> {
        let url = format!(
            "{}?lat={:.2}&lon={:.2}&exclude=current,minutely,daily,alerts&appid={}",
            self.endpoint("/data/3.0/onecall"),
            coordinates.latitude,
            coordinates.longitude,
            self.config.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| UmbrellaError::FetchFailed(format!("OpenWeatherMap: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UmbrellaError::FetchFailed(format!(
                "OpenWeatherMap returned {}: {}",
                status, body
            )));
        }

        let owm_response: OwmOneCallResponse = response.json().await.map_err(|e| {
            UmbrellaError::FetchFailed(format!("Failed to parse OpenWeatherMap response: {}", e))
        })?;

        let forecast = self.convert_response(owm_response)?;
        if !forecast.is_complete() {
            tracing::warn!(
                hours = forecast.samples.len(),
                "OpenWeatherMap returned a short hourly forecast"
            );
        }
        Ok(forecast)
    }

    /// Reverse geocode to "City, State, Country" (state omitted when unknown)
    pub async fn fetch_place_name(&self, coordinates: &Coordinates) -> Result<String> {
        let url = format!(
            "{}?lat={:.2}&lon={:.2}&limit=1&appid={}",
            self.endpoint("/geo/1.0/reverse"),
            coordinates.latitude,
            coordinates.longitude,
            self.config.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| UmbrellaError::GeocodeFailed(format!("OpenWeatherMap: {}", e)))?;

        if !response.status().is_success() {
            return Err(UmbrellaError::GeocodeFailed(format!(
                "OpenWeatherMap returned {}",
                response.status()
            )));
        }

        let places: Vec<OwmPlace> = response.json().await.map_err(|e| {
            UmbrellaError::GeocodeFailed(format!("Failed to parse geocoding response: {}", e))
        })?;

        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| UmbrellaError::GeocodeFailed("no place found".into()))?;

        Ok(format_place_name(place))
    }

    /// Test connection to OpenWeatherMap API
    pub async fn test_connection(&self, coordinates: &Coordinates) -> Result<bool> {
        let url = format!(
            "{}?lat={:.2}&lon={:.2}&appid={}",
            self.endpoint("/data/2.5/weather"),
            coordinates.latitude,
            coordinates.longitude,
            self.config.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| UmbrellaError::FetchFailed(format!("OpenWeatherMap: {}", e)))?;

        Ok(response.status().is_success())
    }

    fn convert_response(&self, response: OwmOneCallResponse) -> Result<HourlyForecast> {
        let first = response
            .hourly
            .first()
            .ok_or_else(|| UmbrellaError::FetchFailed("OpenWeatherMap returned no hourly data".into()))?;

        let starts_at = DateTime::from_timestamp(first.dt, 0).ok_or_else(|| {
            UmbrellaError::InvalidData(format!("invalid forecast timestamp {}", first.dt))
        })?;

        let samples = response
            .hourly
            .iter()
            .enumerate()
            .map(|(offset, item)| convert_hourly(offset as u32, item))
            .collect();

        Ok(HourlyForecast {
            fetched_at: Utc::now(),
            starts_at,
            samples,
        })
    }
}

fn convert_hourly(hour_offset: u32, item: &OwmHourly) -> ForecastSample {
    // Combine rain and snow volume for the hour
    let rain_mm = item.rain.as_ref().map(|r| r.one_hour).unwrap_or(0.0);
    let snow_mm = item.snow.as_ref().map(|s| s.one_hour).unwrap_or(0.0);

    ForecastSample {
        hour_offset,
        probability_of_precipitation: item.pop.clamp(0.0, 1.0),
        volume_mm: (rain_mm + snow_mm).max(0.0),
    }
}

fn format_place_name(place: OwmPlace) -> String {
    let mut parts = vec![place.name];
    parts.extend(place.state.filter(|s| !s.is_empty()));
    parts.extend(place.country.filter(|c| !c.is_empty()));
    parts.join(", ")
}

#[async_trait]
impl ForecastProvider for OpenWeatherMapClient {
    async fn fetch_hourly(&self, coordinates: &Coordinates) -> Result<HourlyForecast> {
        self.fetch_hourly_forecast(coordinates).await
    }
}

#[async_trait]
impl Geocoder for OpenWeatherMapClient {
    async fn reverse_geocode(&self, coordinates: &Coordinates) -> Result<String> {
        self.fetch_place_name(coordinates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenWeatherMapClient {
        OpenWeatherMapClient::new(
            OpenWeatherMapConfig {
                api_key: "test_key".to_string(),
                base_url: server.uri(),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn home() -> Coordinates {
        Coordinates::new(39.8561, -75.7872)
    }

    #[tokio::test]
    async fn fetch_hourly_converts_pop_and_volume() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/3.0/onecall"))
            .and(query_param("lat", "39.86"))
            .and(query_param("lon", "-75.79"))
            .and(query_param("appid", "test_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "lat": 39.86,
                "lon": -75.79,
                "hourly": [
                    { "dt": 1714658400, "pop": 0.1 },
                    { "dt": 1714662000, "pop": 0.6, "rain": { "1h": 1.2 } },
                    { "dt": 1714665600, "pop": 0.8, "rain": { "1h": 0.5 }, "snow": { "1h": 0.3 } },
                    { "dt": 1714669200, "pop": 1.4 }
                ]
            })))
            .mount(&server)
            .await;

        let forecast = client_for(&server).fetch_hourly(&home()).await.unwrap();

        assert_eq!(forecast.starts_at.timestamp(), 1714658400);
        assert_eq!(forecast.samples.len(), 4);
        assert_eq!(forecast.samples[0], ForecastSample::new(0, 0.1, 0.0));
        assert_eq!(forecast.samples[1], ForecastSample::new(1, 0.6, 1.2));
        assert_eq!(forecast.samples[2].hour_offset, 2);
        assert!((forecast.samples[2].volume_mm - 0.8).abs() < 1e-9);
        // Out-of-range probability is clamped
        assert_eq!(forecast.samples[3].probability_of_precipitation, 1.0);
    }

    #[tokio::test]
    async fn fetch_hourly_reports_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/3.0/onecall"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_hourly(&home()).await.unwrap_err();
        assert!(matches!(err, UmbrellaError::FetchFailed(ref msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn fetch_hourly_rejects_empty_hourly() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/3.0/onecall"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "hourly": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_hourly(&home()).await.unwrap_err();
        assert!(matches!(err, UmbrellaError::FetchFailed(_)));
    }

    #[tokio::test]
    async fn reverse_geocode_joins_city_state_country() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geo/1.0/reverse"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "Newark", "state": "Delaware", "country": "US", "lat": 39.68, "lon": -75.75 }
            ])))
            .mount(&server)
            .await;

        let name = client_for(&server).reverse_geocode(&home()).await.unwrap();
        assert_eq!(name, "Newark, Delaware, US");
    }

    #[tokio::test]
    async fn reverse_geocode_without_state_or_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geo/1.0/reverse"))
            .and(query_param("lat", "51.51"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "London", "country": "GB" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/geo/1.0/reverse"))
            .and(query_param("lat", "0.00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let london = client
            .reverse_geocode(&Coordinates::new(51.5072, -0.1276))
            .await
            .unwrap();
        assert_eq!(london, "London, GB");

        let ocean = client.reverse_geocode(&Coordinates::new(0.0, 0.0)).await;
        assert!(matches!(ocean, Err(UmbrellaError::GeocodeFailed(_))));
    }
}
