use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};

/// Administrative breakdown of a geocoded place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeocodedAddress {
    pub admin_level_1: Option<String>,
    pub admin_level_2: Option<String>,
    pub locality: Option<String>,
    pub colloquial_area: Option<String>,
    pub country: Option<String>,
}

impl GeocodedAddress {
    /// Level-1 region, falling back to the colloquial area.
    pub fn region(&self) -> Option<&str> {
        self.admin_level_1
            .as_deref()
            .or(self.colloquial_area.as_deref())
    }

    pub fn department(&self) -> Option<&str> {
        self.admin_level_2.as_deref()
    }

    pub fn is_in(&self, country: &str) -> bool {
        self.country.as_deref() == Some(country)
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` means the service answered but found nothing.
    async fn geocode(&self, query: &str) -> AppResult<Option<GeocodedAddress>>;
}

/// Client for the Google Geocoding web service.
pub struct GoogleGeocoder {
    http: Client,
    endpoint: String,
    region: String,
    language: String,
    api_key: Option<SecretString>,
}

impl GoogleGeocoder {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        Self::with_endpoint(
            &config.geocoder_endpoint,
            config.google_geocoding_api_key.clone(),
            config.geocoder_timeout(),
        )
        .map(|geocoder| {
            geocoder.with_locale(&config.geocoder_region, &config.geocoder_language)
        })
    }

    pub fn with_endpoint(
        endpoint: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("job-locations/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            region: "fr".to_string(),
            language: "fr".to_string(),
            api_key,
        })
    }

    pub fn with_locale(mut self, region: &str, language: &str) -> Self {
        self.region = region.to_string();
        self.language = language.to_string();
        self
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, query: &str) -> AppResult<Option<GeocodedAddress>> {
        #[derive(Deserialize)]
        struct Response {
            status: String,
            #[serde(default)]
            results: Vec<ResponseResult>,
            error_message: Option<String>,
        }

        #[derive(Deserialize)]
        struct ResponseResult {
            #[serde(default)]
            address_components: Vec<AddressComponent>,
        }

        let mut params = vec![
            ("address", query),
            ("region", self.region.as_str()),
            ("language", self.language.as_str()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("key", key.expose_secret()));
        }

        debug!(query, "querying geocoding service");
        let response = self
            .http
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await?
            .error_for_status()?;
        let parsed: Response = response.json().await?;

        match parsed.status.as_str() {
            "OK" => Ok(parsed
                .results
                .into_iter()
                .next()
                .map(|result| address_from_components(&result.address_components))),
            "ZERO_RESULTS" => Ok(None),
            other => Err(AppError::Geocoder(match parsed.error_message {
                Some(message) => format!("{other}: {message}"),
                None => other.to_string(),
            })),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Folds Google address components into a [`GeocodedAddress`]. When a
/// component carries several types the most specific administrative one wins.
pub fn address_from_components(components: &[AddressComponent]) -> GeocodedAddress {
    let mut address = GeocodedAddress::default();
    for component in components {
        let has = |kind: &str| component.types.iter().any(|t| t == kind);
        let slot = if has("administrative_area_level_2") {
            &mut address.admin_level_2
        } else if has("colloquial_area") {
            &mut address.colloquial_area
        } else if has("administrative_area_level_1") {
            &mut address.admin_level_1
        } else if has("country") {
            &mut address.country
        } else if has("locality") {
            &mut address.locality
        } else {
            continue;
        };
        if slot.is_none() {
            *slot = Some(component.long_name.clone());
        }
    }
    address
}

/// Fixed query -> address table. Useful for offline runs and tests; counts
/// every request it answers.
#[derive(Default)]
pub struct StaticGeocoder {
    answers: HashMap<String, GeocodedAddress>,
    requests: Arc<AtomicUsize>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &str, address: GeocodedAddress) -> Self {
        self.answers.insert(query.to_string(), address);
        self
    }

    /// Shared request counter, still readable after the geocoder is moved.
    pub fn request_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.requests)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, query: &str) -> AppResult<Option<GeocodedAddress>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.answers.get(query).cloned())
    }
}
