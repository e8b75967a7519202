//! Geonames full-text search (`/searchJSON`).

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use super::{build_agent, fetch_json, FetchError, GeocodingProvider};
use crate::config::GeonamesConfig;
use crate::error::{ConfigError, ProviderError};
use crate::location::matching::MatchPolicy;
use crate::location::throttle::{RateLimit, Throttle};
use crate::location::types::{Candidate, Coordinate, Geometry, ServiceId};

pub struct GeonamesProvider {
    agent: ureq::Agent,
    endpoint: String,
    username: String,
    max_rows: u32,
    throttle: Box<dyn Throttle>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    geonames: Vec<Place>,
    /// Present instead of results when the service refuses a request
    /// (bad username, exhausted credits, ...), still with HTTP 200.
    #[serde(default)]
    status: Option<ServiceStatus>,
}

#[derive(Deserialize)]
struct ServiceStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    value: Option<i64>,
}

#[derive(Deserialize)]
struct Place {
    #[serde(default)]
    name: String,
    #[serde(default)]
    lat: Value,
    #[serde(default)]
    lng: Value,
    #[serde(default, rename = "alternateNames")]
    alternate_names: Vec<AlternateName>,
}

#[derive(Deserialize)]
struct AlternateName {
    #[serde(default)]
    name: String,
}

impl GeonamesProvider {
    /// Fails when no username is configured; Geonames rejects anonymous calls.
    pub fn new(config: &GeonamesConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let username = config
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingCredential("GEONAMES_USERNAME"))?;

        Ok(Self {
            agent: build_agent(timeout),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            username: username.to_string(),
            max_rows: config.max_rows,
            throttle: Box::new(RateLimit::per_second(config.calls_per_second)),
        })
    }

    pub fn with_throttle(mut self, throttle: impl Throttle + 'static) -> Self {
        self.throttle = Box::new(throttle);
        self
    }

    fn fetch(
        &self,
        place_name: &str,
        country_code: Option<&str>,
        place_type: Option<&str>,
    ) -> Result<Vec<Place>, FetchError> {
        self.throttle.acquire();
        let mut request = self
            .agent
            .get(&format!("{}/searchJSON", self.endpoint))
            .query("q", place_name)
            .query("username", &self.username)
            .query("maxRows", &self.max_rows.to_string())
            .query("type", "json")
            .query("style", "FULL");
        if let Some(cc) = country_code {
            request = request.query("country", cc);
        }
        if let Some(feature_class) = place_type {
            // Feature classes are uppercase in the API (P, A, H, T); sent as mapped.
            request = request.query("featureClass", feature_class);
        }

        let response: SearchResponse = fetch_json(request)?;
        if let Some(status) = response.status {
            return Err(FetchError::Shape(format!(
                "service error {}: {}",
                status.value.unwrap_or_default(),
                status.message
            )));
        }
        Ok(response.geonames)
    }
}

impl GeocodingProvider for GeonamesProvider {
    fn id(&self) -> ServiceId {
        ServiceId::Geonames
    }

    fn policy(&self) -> MatchPolicy {
        MatchPolicy::BestScoring
    }

    fn search(
        &self,
        place_name: &str,
        country_code: Option<&str>,
        place_type: Option<&str>,
    ) -> Result<Vec<Candidate>, ProviderError> {
        debug!(place = place_name, feature_class = ?place_type, "querying Geonames");
        match self.fetch(place_name, country_code, place_type) {
            Ok(places) => Ok(places.into_iter().map(to_candidate).collect()),
            Err(e) => {
                error!(place = place_name, error = %e, "error querying Geonames");
                Ok(Vec::new())
            }
        }
    }
}

fn to_candidate(place: Place) -> Candidate {
    let geometry = match (degrees(&place.lat), degrees(&place.lng)) {
        (Some(lat), Some(lon)) => Coordinate::new(lat, lon).map_or(Geometry::Missing, Geometry::Point),
        _ => Geometry::Missing,
    };
    let alt_labels = place
        .alternate_names
        .into_iter()
        .map(|a| a.name)
        .filter(|n| !n.is_empty())
        .collect();
    Candidate::new(place.name, geometry).with_alt_labels(alt_labels)
}

/// Geonames sends coordinates as decimal strings; accept plain numbers too.
fn degrees(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}
