use std::path::PathBuf;
use std::time::Duration;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

use crate::errors::{AppError, AppResult};

const DEFAULT_GEOCODER_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const DEFAULT_GEOCODER_TIMEOUT_SECS: u64 = 5;
const DEFAULT_CACHE_PATH: &str = "city_locations.csv";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Csv,
    Sqlite,
}

impl CacheBackend {
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" | "file" => Ok(CacheBackend::Csv),
            "sqlite" | "db" => Ok(CacheBackend::Sqlite),
            other => Err(AppError::Config(format!("invalid cache backend: {other}"))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub geocoder_endpoint: String,
    pub geocoder_region: String,
    pub geocoder_language: String,
    pub geocoder_timeout_secs: u64,
    pub google_geocoding_api_key: Option<SecretString>,
    pub cache_path: PathBuf,
    pub cache_backend: CacheBackend,
    pub input_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub geocoder_endpoint: String,
    pub geocoder_region: String,
    pub geocoder_language: String,
    pub geocoder_timeout_secs: u64,
    pub cache_path: String,
    pub cache_backend: CacheBackend,
    pub has_google_geocoding_key: bool,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        load_dotenv_if_applicable();
        let cache_backend = match env::var("LOCATION_CACHE_BACKEND") {
            Ok(value) if !value.trim().is_empty() => CacheBackend::parse(&value)?,
            _ => CacheBackend::Csv,
        };
        Ok(Self {
            geocoder_endpoint: env::var("GEOCODER_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GEOCODER_ENDPOINT.to_string()),
            geocoder_region: env::var("GEOCODER_REGION").unwrap_or_else(|_| "fr".to_string()),
            geocoder_language: env::var("GEOCODER_LANGUAGE").unwrap_or_else(|_| "fr".to_string()),
            geocoder_timeout_secs: parse_u64("GEOCODER_TIMEOUT_SECS", DEFAULT_GEOCODER_TIMEOUT_SECS)
                .max(1),
            google_geocoding_api_key: env::var("GOOGLE_GEOCODING_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
            cache_path: env::var("LOCATION_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_PATH)),
            cache_backend,
            input_path: env::var("JOBS_INPUT_PATH").ok().map(PathBuf::from),
            output_path: env::var("JOBS_OUTPUT_PATH").ok().map(PathBuf::from),
        })
    }

    pub fn geocoder_timeout(&self) -> Duration {
        Duration::from_secs(self.geocoder_timeout_secs)
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            geocoder_endpoint: self.geocoder_endpoint.clone(),
            geocoder_region: self.geocoder_region.clone(),
            geocoder_language: self.geocoder_language.clone(),
            geocoder_timeout_secs: self.geocoder_timeout_secs,
            cache_path: self.cache_path.to_string_lossy().to_string(),
            cache_backend: self.cache_backend,
            has_google_geocoding_key: self.google_geocoding_api_key.is_some(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
