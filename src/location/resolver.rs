//! Place resolver: tries each gazetteer in priority order.
//!
//! Flow per provider: map place type → search → fuzzy match → first
//! coordinate wins. A provider that rejects the query is logged and skipped.

use tracing::{debug, info, warn};

use super::place_types::{PlaceTypeMapper, DEFAULT_PLACE_TYPE};
use super::providers::{self, GeocodingProvider};
use super::types::{Coordinate, PlaceQuery, Resolution, ServiceId};
use crate::config::ResolverConfig;
use crate::error::ConfigError;

pub struct PlaceResolver {
    providers: Vec<Box<dyn GeocodingProvider>>,
    mapper: PlaceTypeMapper,
    threshold: f64,
}

impl PlaceResolver {
    /// `threshold` is a similarity score in `0..=100`.
    pub fn new(
        providers: Vec<Box<dyn GeocodingProvider>>,
        mapper: PlaceTypeMapper,
        threshold: f64,
    ) -> Result<Self, ConfigError> {
        if !(0.0..=100.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "fuzzy threshold must be between 0 and 100, got {}",
                threshold
            )));
        }
        Ok(Self {
            providers,
            mapper,
            threshold,
        })
    }

    /// Build the type map and every configured provider, in configured order.
    pub fn from_config(config: &ResolverConfig) -> Result<Self, ConfigError> {
        let mapper = match &config.places_map {
            Some(path) => PlaceTypeMapper::from_path(path)?,
            None => PlaceTypeMapper::bundled()?,
        };
        let providers = config
            .services
            .iter()
            .map(|&service| providers::build(service, config))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            services = ?config.services,
            threshold = config.threshold,
            place_types = mapper.len(),
            "place resolver ready"
        );
        Self::new(providers, mapper, config.threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn services(&self) -> impl Iterator<Item = ServiceId> + '_ {
        self.providers.iter().map(|p| p.id())
    }

    pub fn mapper(&self) -> &PlaceTypeMapper {
        &self.mapper
    }

    /// Resolve a place name to a coordinate, or `None` when no provider
    /// produced a match above the threshold.
    pub fn resolve(
        &self,
        place_name: &str,
        country_code: Option<&str>,
        place_type: Option<&str>,
        use_default_filter: bool,
    ) -> Option<Coordinate> {
        self.resolve_with_source(place_name, country_code, place_type, use_default_filter)
            .map(|r| r.coordinate)
    }

    pub fn resolve_query(&self, query: &PlaceQuery, use_default_filter: bool) -> Option<Coordinate> {
        self.resolve(
            &query.place_name,
            query.country_code.as_deref(),
            query.place_type.as_deref(),
            use_default_filter,
        )
    }

    /// Like [`resolve`](Self::resolve), also reporting which service answered.
    pub fn resolve_with_source(
        &self,
        place_name: &str,
        country_code: Option<&str>,
        place_type: Option<&str>,
        use_default_filter: bool,
    ) -> Option<Resolution> {
        if place_name.trim().is_empty() {
            warn!("empty place name, nothing to resolve");
            return None;
        }
        // Blank filters count as absent.
        let country_code = country_code.map(str::trim).filter(|s| !s.is_empty());
        let place_type = place_type.map(str::trim).filter(|s| !s.is_empty());

        for provider in &self.providers {
            let service = provider.id();
            let filter = place_type.and_then(|t| self.service_type(t, service, use_default_filter));
            debug!(place = place_name, %service, place_type = ?filter, "trying provider");

            let candidates = match provider.search(place_name, country_code, filter) {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(place = place_name, %service, error = %e, "provider failed, trying next");
                    continue;
                }
            };

            if let Some(coordinate) = provider.best_match(&candidates, place_name, self.threshold) {
                info!(place = place_name, %service, %coordinate, "place resolved");
                return Some(Resolution {
                    coordinate,
                    source: service,
                });
            }
            debug!(place = place_name, %service, candidates = candidates.len(), "no match");
        }

        warn!(place = place_name, "no provider could resolve place");
        None
    }

    /// Service-specific identifier for a generic place type.
    fn service_type(&self, place_type: &str, service: ServiceId, use_default_filter: bool) -> Option<&str> {
        if let Some(mapped) = self.mapper.get_for_service(place_type, service.as_str()) {
            return Some(mapped);
        }
        if use_default_filter {
            warn!(
                place_type,
                %service,
                fallback = DEFAULT_PLACE_TYPE,
                "unrecognised place type, using fallback"
            );
            self.mapper.get_for_service(DEFAULT_PLACE_TYPE, service.as_str())
        } else {
            info!(place_type, %service, "unrecognised place type, searching without type filter");
            None
        }
    }
}
