//! Gazetteer providers: Getty TGN, World Historical Gazetteer, Geonames, Wikidata.
//!
//! Every provider turns its service's response shape into plain
//! [`Candidate`]s and swallows transport failures (logged, empty result), so
//! the resolver only ever sees candidates or a rejected query.

pub mod geonames;
pub mod tgn;
pub mod whg;
pub mod wikidata;

use serde::de::DeserializeOwned;
use std::time::Duration;

use super::matching::{self, MatchPolicy};
use super::types::{Candidate, Coordinate, ServiceId};
use crate::config::ResolverConfig;
use crate::error::{ConfigError, ProviderError};

pub use geonames::GeonamesProvider;
pub use tgn::TgnProvider;
pub use whg::WhgProvider;
pub use wikidata::WikidataProvider;

const USER_AGENT: &str = concat!("georesolver/", env!("CARGO_PKG_VERSION"));

/// Uniform contract over one external search API.
pub trait GeocodingProvider: Send + Sync {
    fn id(&self) -> ServiceId;

    fn policy(&self) -> MatchPolicy;

    /// Query the service. Transport and format errors yield `Ok(vec![])`.
    fn search(
        &self,
        place_name: &str,
        country_code: Option<&str>,
        place_type: Option<&str>,
    ) -> Result<Vec<Candidate>, ProviderError>;

    /// Coordinate of a candidate that already passed the similarity check.
    fn locate(&self, candidate: &Candidate) -> Option<Coordinate> {
        candidate.geometry.point()
    }

    fn best_match(&self, candidates: &[Candidate], place_name: &str, threshold: f64) -> Option<Coordinate> {
        matching::best_match(candidates, place_name, threshold, self.policy(), |c| self.locate(c))
    }
}

/// Build the provider for `service` from configuration.
pub fn build(service: ServiceId, config: &ResolverConfig) -> Result<Box<dyn GeocodingProvider>, ConfigError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    Ok(match service {
        ServiceId::Tgn => Box::new(TgnProvider::new(&config.tgn, timeout)),
        ServiceId::Whg => Box::new(WhgProvider::new(&config.whg, timeout)?),
        ServiceId::Geonames => Box::new(GeonamesProvider::new(&config.geonames, timeout)?),
        ServiceId::Wikidata => Box::new(WikidataProvider::new(&config.wikidata, timeout)),
    })
}

// ─── HTTP plumbing ──────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub(crate) enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] Box<ureq::Error>),

    #[error("could not decode response: {0}")]
    Decode(#[from] std::io::Error),

    #[error("unexpected response shape: {0}")]
    Shape(String),
}

pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Send the request and decode a JSON body. Non-2xx statuses are errors.
pub(crate) fn fetch_json<T: DeserializeOwned>(request: ureq::Request) -> Result<T, FetchError> {
    let response = request.call().map_err(Box::new)?;
    Ok(response.into_json()?)
}
