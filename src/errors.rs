use std::io;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Config(String),
    #[error("{0}")]
    Parse(String),
    #[error("geocoding service error: {0}")]
    Geocoder(String),
    #[error("could not resolve location for '{city}': {reason}")]
    Resolution { city: String, reason: String },
    #[error("failed to load location cache from {location}: {reason}")]
    CacheLoad { location: String, reason: String },
    #[error("failed to persist location cache entry for '{city}': {reason}")]
    CacheWrite { city: String, reason: String },
}

impl AppError {
    pub fn resolution(city: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Resolution {
            city: city.into(),
            reason: reason.into(),
        }
    }
}
