//! World Historical Gazetteer index search.
//!
//! Results are a GeoJSON feature collection. Geometries use `[lon, lat]`
//! order and are sometimes `GeometryCollection`s.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{build_agent, fetch_json, GeocodingProvider};
use crate::config::WhgConfig;
use crate::error::{ConfigError, ProviderError};
use crate::location::matching::MatchPolicy;
use crate::location::throttle::{RateLimit, Throttle};
use crate::location::types::{Candidate, Coordinate, Geometry, ServiceId};

/// Linked Places feature class for places/settlements.
const DEFAULT_FEATURE_CLASS: &str = "p";

pub struct WhgProvider {
    agent: ureq::Agent,
    endpoint: String,
    search_path: String,
    collection: String,
    throttle: Box<dyn Throttle>,
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: FeatureProperties,
    #[serde(default)]
    geometry: Value,
}

#[derive(Deserialize, Default)]
struct FeatureProperties {
    #[serde(default)]
    title: Option<String>,
}

impl WhgProvider {
    pub fn new(config: &WhgConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(ConfigError::Invalid("WHG endpoint must be a non-empty URL".into()));
        }
        Ok(Self {
            agent: build_agent(timeout),
            endpoint: endpoint.to_string(),
            search_path: config.search_path.clone(),
            collection: config.collection.clone(),
            throttle: Box::new(RateLimit::per_second(config.calls_per_second)),
        })
    }

    pub fn with_throttle(mut self, throttle: impl Throttle + 'static) -> Self {
        self.throttle = Box::new(throttle);
        self
    }

    fn reject(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::InvalidQuery {
            service: ServiceId::Whg,
            message: message.into(),
        }
    }
}

impl GeocodingProvider for WhgProvider {
    fn id(&self) -> ServiceId {
        ServiceId::Whg
    }

    fn policy(&self) -> MatchPolicy {
        MatchPolicy::FirstAcceptable
    }

    fn search(
        &self,
        place_name: &str,
        country_code: Option<&str>,
        place_type: Option<&str>,
    ) -> Result<Vec<Candidate>, ProviderError> {
        if place_name.trim().is_empty() {
            return Err(self.reject("place name must be a non-empty string"));
        }
        if let Some(cc) = country_code {
            if cc.len() != 2 || !cc.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(self.reject(format!("'{}' is not a 2-letter country code", cc)));
            }
        }
        let feature_class = place_type.unwrap_or_else(|| {
            warn!(place = place_name, "no place type for WHG, defaulting to feature class 'p'");
            DEFAULT_FEATURE_CLASS
        });

        self.throttle.acquire();
        let url = format!("{}{}/", self.endpoint, self.search_path);
        let request = self
            .agent
            .get(&url)
            .query("name", place_name)
            .query("ccodes", country_code.unwrap_or(""))
            .query("fclass", feature_class)
            .query("dataset", &self.collection);
        debug!(place = place_name, fclass = feature_class, "querying WHG");

        match fetch_json::<FeatureCollection>(request) {
            Ok(collection) => Ok(collection
                .features
                .into_iter()
                .map(|f| {
                    Candidate::new(
                        f.properties.title.unwrap_or_default(),
                        geometry_from_geojson(&f.geometry),
                    )
                })
                .collect()),
            Err(e) => {
                error!(place = place_name, error = %e, "error searching WHG");
                Ok(Vec::new())
            }
        }
    }
}

/// Convert a GeoJSON geometry, swapping `[lon, lat]` into a [`Coordinate`].
fn geometry_from_geojson(value: &Value) -> Geometry {
    match value.get("type").and_then(Value::as_str) {
        Some("Point") => value
            .get("coordinates")
            .and_then(point_from_lon_lat)
            .map_or(Geometry::Missing, Geometry::Point),
        Some("GeometryCollection") => Geometry::Collection(
            value
                .get("geometries")
                .and_then(Value::as_array)
                .map(|members| members.iter().map(geometry_from_geojson).collect())
                .unwrap_or_default(),
        ),
        Some(other) => Geometry::Other(other.to_string()),
        None => Geometry::Missing,
    }
}

fn point_from_lon_lat(value: &Value) -> Option<Coordinate> {
    let position = value.as_array()?;
    let lon = position.first()?.as_f64()?;
    let lat = position.get(1)?.as_f64()?;
    Coordinate::from_lon_lat(lon, lat)
}
