use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::aliases::GeocoderAliasRewriter;
use crate::cache::{Location, LocationCache};
use crate::errors::{AppError, AppResult};
use crate::geocoder::{GeocodedAddress, Geocoder};
use crate::regions::RegionAliasTable;

/// Department and region recorded for places outside France.
pub const FOREIGN: &str = "Étranger";

const HOME_COUNTRY: &str = "France";

/// Immutable lookup tables shared by the resolver, built once per run.
#[derive(Debug, Clone, Default)]
pub struct LocationTables {
    pub aliases: GeocoderAliasRewriter,
    pub regions: RegionAliasTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Cache,
    Geocoder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub location: Location,
    pub source: ResolutionSource,
    /// False when a new entry could not be persisted; it is still cached in
    /// memory for the rest of the run.
    pub persisted: bool,
}

pub struct GeoResolver {
    cache: LocationCache,
    geocoder: Arc<dyn Geocoder>,
    tables: Arc<LocationTables>,
    geocoder_requests: usize,
}

impl GeoResolver {
    pub fn new(
        cache: LocationCache,
        geocoder: Arc<dyn Geocoder>,
        tables: Arc<LocationTables>,
    ) -> Self {
        Self {
            cache,
            geocoder,
            tables,
            geocoder_requests: 0,
        }
    }

    /// Geocoder-ready form of a normalized city name.
    pub fn rewrite(&self, normalized: &str) -> String {
        self.tables.aliases.rewrite(normalized)
    }

    pub fn cache(&self) -> &LocationCache {
        &self.cache
    }

    /// Number of requests sent to the geocoding service so far.
    pub fn geocoder_requests(&self) -> usize {
        self.geocoder_requests
    }

    pub async fn resolve(&mut self, city: &str) -> AppResult<Resolution> {
        if let Some(location) = self.cache.lookup(city) {
            return Ok(Resolution {
                location: location.clone(),
                source: ResolutionSource::Cache,
                persisted: true,
            });
        }

        info!(city, "unknown city; querying geocoding service");
        let location = self.locate(city).await?;
        info!(
            city,
            department = %location.department,
            region = %location.region,
            "resolved city"
        );

        let persisted = match self.cache.append(city, location.clone()) {
            Ok(()) => true,
            Err(err) => {
                warn!(?err, city, "location kept in memory only; next run will query again");
                false
            }
        };

        Ok(Resolution {
            location,
            source: ResolutionSource::Geocoder,
            persisted,
        })
    }

    async fn locate(&mut self, city: &str) -> AppResult<Location> {
        let address = self.first_match(city).await?;

        if !address.is_in(HOME_COUNTRY) {
            debug!(city, country = ?address.country, "city is outside France");
            return Ok(Location::new(FOREIGN, FOREIGN));
        }

        let mut locality_address: Option<GeocodedAddress> = None;

        let region = match address.region() {
            Some(region) => region.to_string(),
            None => self
                .by_locality(city, &address, &mut locality_address)
                .await?
                .region()
                .map(str::to_string)
                .ok_or_else(|| AppError::resolution(city, "no region in geocoding result"))?,
        };

        let department = match address.department() {
            Some(department) => department.to_string(),
            None => self
                .by_locality(city, &address, &mut locality_address)
                .await?
                .department()
                .map(str::to_string)
                .ok_or_else(|| AppError::resolution(city, "no department in geocoding result"))?,
        };

        Ok(Location::new(
            department,
            self.tables.regions.canonicalize_region(&region),
        ))
    }

    /// Full name first, then its first word for over-qualified inputs.
    async fn first_match(&mut self, city: &str) -> AppResult<GeocodedAddress> {
        if let Some(address) = self.query(city).await? {
            return Ok(address);
        }

        let mut words = city.split_whitespace();
        match (words.next(), words.next()) {
            (Some(first), Some(_)) => {
                debug!(city, retry = first, "no result; retrying with first word");
                self.query(first)
                    .await?
                    .ok_or_else(|| AppError::resolution(city, "no geocoding result"))
            }
            _ => Err(AppError::resolution(city, "no geocoding result")),
        }
    }

    /// Re-queries the service with the locality of the first answer. The
    /// answer is kept in `memo` so region and department share one request.
    async fn by_locality<'m>(
        &mut self,
        city: &str,
        address: &GeocodedAddress,
        memo: &'m mut Option<GeocodedAddress>,
    ) -> AppResult<&'m GeocodedAddress> {
        if memo.is_none() {
            let locality = address
                .locality
                .as_deref()
                .ok_or_else(|| AppError::resolution(city, "no locality to retry with"))?;
            debug!(city, locality, "incomplete result; retrying with locality");
            let retried = self.query(locality).await?.ok_or_else(|| {
                AppError::resolution(city, format!("no geocoding result for locality {locality}"))
            })?;
            *memo = Some(retried);
        }
        memo.as_ref()
            .ok_or_else(|| AppError::resolution(city, "no locality result"))
    }

    async fn query(&mut self, query: &str) -> AppResult<Option<GeocodedAddress>> {
        self.geocoder_requests += 1;
        self.geocoder.geocode(query).await
    }
}
