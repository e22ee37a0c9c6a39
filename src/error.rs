use thiserror::Error;

#[derive(Error, Debug)]
pub enum UmbrellaError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Forecast fetch failed: {0}")]
    FetchFailed(String),

    #[error("Incomplete forecast: expected {expected} hourly samples, received {received}")]
    Incomplete { expected: usize, received: usize },

    #[error("Reverse geocoding failed: {0}")]
    GeocodeFailed(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, UmbrellaError>;
