//! Wikidata entity search.
//!
//! `wbsearchentities` only returns ids and labels, so every hit needs a
//! second request for its claims: coordinates (P625), country (P17) and
//! instance-of (P31). Hits whose claims can't be fetched, or that fail a
//! filter, are dropped.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{build_agent, fetch_json, FetchError, GeocodingProvider};
use crate::config::WikidataConfig;
use crate::error::ProviderError;
use crate::location::matching::MatchPolicy;
use crate::location::throttle::{RateLimit, Throttle};
use crate::location::types::{Candidate, Coordinate, Geometry, ServiceId};

const COORDINATE_LOCATION: &str = "P625";
const COUNTRY: &str = "P17";
const INSTANCE_OF: &str = "P31";
const ISO_3166_ALPHA2: &str = "P297";

pub struct WikidataProvider {
    agent: ureq::Agent,
    search_endpoint: String,
    entity_endpoint: String,
    language: String,
    limit: u32,
    throttle: Box<dyn Throttle>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    id: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    aliases: Vec<String>,
}

impl WikidataProvider {
    pub fn new(config: &WikidataConfig, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            search_endpoint: config.search_endpoint.clone(),
            entity_endpoint: config.entity_endpoint.clone(),
            language: config.language.clone(),
            limit: config.limit,
            throttle: Box::new(RateLimit::per_second(config.calls_per_second)),
        }
    }

    pub fn with_throttle(mut self, throttle: impl Throttle + 'static) -> Self {
        self.throttle = Box::new(throttle);
        self
    }

    fn search_hits(&self, place_name: &str) -> Result<Vec<SearchHit>, FetchError> {
        self.throttle.acquire();
        let request = self
            .agent
            .get(&self.search_endpoint)
            .query("action", "wbsearchentities")
            .query("search", place_name)
            .query("language", &self.language)
            .query("format", "json")
            .query("type", "item")
            .query("limit", &self.limit.to_string());
        let response: SearchResponse = fetch_json(request)?;
        Ok(response.search)
    }

    /// The `claims` object of one entity.
    fn fetch_claims(&self, qid: &str) -> Result<Value, FetchError> {
        self.throttle.acquire();
        let url = format!("{}{}.json", self.entity_endpoint, qid);
        let mut doc: Value = fetch_json(self.agent.get(&url))?;

        let entities = doc
            .get_mut("entities")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| FetchError::Shape(format!("no entities in {}", url)))?;
        // Redirected items come back under their new id.
        let entity = match entities.remove(qid) {
            Some(e) => e,
            None => entities
                .values_mut()
                .next()
                .map(Value::take)
                .ok_or_else(|| FetchError::Shape(format!("entity {} missing from {}", qid, url)))?,
        };
        Ok(entity.get("claims").cloned().unwrap_or(Value::Null))
    }

    fn country_iso_code(&self, country_qid: &str) -> Option<String> {
        match self.fetch_claims(country_qid) {
            Ok(claims) => claim_value(&claims, ISO_3166_ALPHA2)?.as_str().map(str::to_string),
            Err(e) => {
                warn!(country = country_qid, error = %e, "could not fetch country entity");
                None
            }
        }
    }

    /// Compare the entity's country against `iso_code`. Lookups are
    /// memoised for the duration of one search.
    fn matches_country(&self, claims: &Value, iso_code: &str, seen: &mut HashMap<String, Option<String>>) -> bool {
        let Some(country) = claim_value(claims, COUNTRY)
            .and_then(|v| v.get("id"))
            .and_then(Value::as_str)
        else {
            return false;
        };
        let code = seen
            .entry(country.to_string())
            .or_insert_with(|| self.country_iso_code(country));
        code.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(iso_code))
    }
}

impl GeocodingProvider for WikidataProvider {
    fn id(&self) -> ServiceId {
        ServiceId::Wikidata
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
        let hits = match self.search_hits(place_name) {
            Ok(hits) => hits,
            Err(e) => {
                error!(place = place_name, error = %e, "error querying Wikidata search API");
                return Ok(Vec::new());
            }
        };
        debug!(place = place_name, hits = hits.len(), "Wikidata search hits");

        let mut countries = HashMap::new();
        let mut candidates = Vec::new();

        for hit in hits {
            let claims = match self.fetch_claims(&hit.id) {
                Ok(claims) => claims,
                Err(e) => {
                    warn!(qid = %hit.id, error = %e, "could not fetch entity data");
                    continue;
                }
            };
            let Some(coord) = coordinates(&claims) else {
                debug!(qid = %hit.id, "no coordinate claim, dropping");
                continue;
            };
            if let Some(cc) = country_code {
                if !self.matches_country(&claims, cc, &mut countries) {
                    debug!(qid = %hit.id, country = cc, "country filter rejected");
                    continue;
                }
            }
            if let Some(class) = place_type {
                if !instance_of(&claims).contains(&class) {
                    debug!(qid = %hit.id, class, "type filter rejected");
                    continue;
                }
            }
            candidates.push(
                Candidate::new(hit.label, Geometry::Point(coord))
                    .with_alt_labels(hit.aliases)
                    .with_reference(hit.id),
            );
        }
        Ok(candidates)
    }
}

/// `claims[property][0].mainsnak.datavalue.value`
fn claim_value<'a>(claims: &'a Value, property: &str) -> Option<&'a Value> {
    claims
        .get(property)?
        .get(0)?
        .pointer("/mainsnak/datavalue/value")
}

fn coordinates(claims: &Value) -> Option<Coordinate> {
    let value = claim_value(claims, COORDINATE_LOCATION)?;
    Coordinate::new(value.get("latitude")?.as_f64()?, value.get("longitude")?.as_f64()?)
}

fn instance_of(claims: &Value) -> Vec<&str> {
    claims
        .get(INSTANCE_OF)
        .and_then(Value::as_array)
        .map(|statements| {
            statements
                .iter()
                .filter_map(|s| s.pointer("/mainsnak/datavalue/value/id")?.as_str())
                .collect()
        })
        .unwrap_or_default()
}
