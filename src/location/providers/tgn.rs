//! Getty Thesaurus of Geographic Names, via its SPARQL endpoint.
//!
//! Search results carry only a concept URI and its preferred label. The
//! coordinate is fetched lazily from the concept's linked-data JSON once a
//! candidate has passed the similarity check.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{build_agent, fetch_json, FetchError, GeocodingProvider};
use crate::config::TgnConfig;
use crate::error::ProviderError;
use crate::location::matching::MatchPolicy;
use crate::location::throttle::{RateLimit, Throttle};
use crate::location::types::{Candidate, Coordinate, Geometry, ServiceId};

const SPATIAL_COORDINATES: &str = "crm:E47_Spatial_Coordinates";

pub struct TgnProvider {
    agent: ureq::Agent,
    endpoint: String,
    language: String,
    throttle: Box<dyn Throttle>,
}

#[derive(Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Deserialize)]
struct SparqlResults {
    bindings: Vec<Binding>,
}

#[derive(Deserialize)]
struct Binding {
    #[serde(default)]
    p: Option<SparqlTerm>,
    #[serde(default, rename = "pLab")]
    p_lab: Option<SparqlTerm>,
}

#[derive(Deserialize)]
struct SparqlTerm {
    value: String,
}

#[derive(Deserialize)]
struct LinkedDataRecord {
    #[serde(default)]
    identified_by: Vec<Identifier>,
}

#[derive(Deserialize)]
struct Identifier {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    value: Option<Value>,
}

impl TgnProvider {
    pub fn new(config: &TgnConfig, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            endpoint: config.endpoint.clone(),
            language: config.language.clone(),
            throttle: Box::new(RateLimit::per_second(config.calls_per_second)),
        }
    }

    pub fn with_throttle(mut self, throttle: impl Throttle + 'static) -> Self {
        self.throttle = Box::new(throttle);
        self
    }

    fn build_query(&self, place_name: &str, country_code: Option<&str>, place_type: Option<&str>) -> String {
        let country_filter = match country_code {
            Some(cc) => format!(
                "?pp1 skos:inScheme tgn:; luc:term \"{}\"; gvp:prefLabelGVP [xl:literalForm ?pp1Lab].\n    \
                 ?p gvp:broaderPartitiveExtended ?pp1.",
                sparql_escape(cc)
            ),
            None => String::new(),
        };
        let type_filter = match place_type {
            Some(t) => format!(
                "?p gvp:placeType [rdfs:label \"{}\"@{}].",
                sparql_escape(t),
                self.language
            ),
            None => String::new(),
        };

        format!(
            "PREFIX skos: <http://www.w3.org/2004/02/skos/core#>
PREFIX luc: <http://www.ontotext.com/owlim/lucene#>
PREFIX gvp: <http://vocab.getty.edu/ontology#>
PREFIX xl: <http://www.w3.org/2008/05/skos-xl#>
PREFIX tgn: <http://vocab.getty.edu/tgn/>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>

SELECT DISTINCT ?p ?pLab {{
    ?p skos:inScheme tgn:; luc:term \"{}\"; gvp:prefLabelGVP [xl:literalForm ?pLab].
    {}
    {}
}}",
            sparql_escape(place_name),
            country_filter,
            type_filter
        )
    }

    fn query_bindings(&self, sparql: &str) -> Result<Vec<Binding>, FetchError> {
        self.throttle.acquire();
        let request = self
            .agent
            .get(&self.endpoint)
            .set("Accept", "application/sparql-results+json")
            .query("query", sparql);
        let response: SparqlResponse = fetch_json(request)?;
        Ok(response.results.bindings)
    }

    /// Fetch `<uri>.json` and read its spatial-coordinates identifier.
    fn coordinates_for(&self, uri: &str) -> Result<Coordinate, FetchError> {
        self.throttle.acquire();
        let record: LinkedDataRecord = fetch_json(self.agent.get(&format!("{}.json", uri)))?;
        record
            .identified_by
            .iter()
            .filter(|id| id.kind.as_deref() == Some(SPATIAL_COORDINATES))
            .find_map(|id| id.value.as_ref().and_then(parse_lon_lat))
            .ok_or_else(|| FetchError::Shape(format!("no usable {} in {}", SPATIAL_COORDINATES, uri)))
    }
}

impl GeocodingProvider for TgnProvider {
    fn id(&self) -> ServiceId {
        ServiceId::Tgn
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
        let sparql = self.build_query(place_name, country_code, place_type);
        debug!(place = place_name, "querying TGN");

        match self.query_bindings(&sparql) {
            Ok(bindings) => Ok(bindings
                .into_iter()
                .map(|b| {
                    let label = b.p_lab.map(|t| t.value).unwrap_or_default();
                    let candidate = Candidate::new(label, Geometry::Missing);
                    match b.p {
                        Some(uri) => candidate.with_reference(uri.value),
                        None => candidate,
                    }
                })
                .collect()),
            Err(e) => {
                error!(place = place_name, error = %e, "error querying TGN");
                Ok(Vec::new())
            }
        }
    }

    fn locate(&self, candidate: &Candidate) -> Option<Coordinate> {
        let uri = candidate.reference.as_deref()?;
        match self.coordinates_for(uri) {
            Ok(coord) => Some(coord),
            Err(e) => {
                warn!(uri, error = %e, "could not fetch TGN coordinates");
                None
            }
        }
    }
}

/// Escape a string for use inside a double-quoted SPARQL literal.
fn sparql_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// TGN stores coordinates as the string `"[lon, lat]"`.
fn parse_lon_lat(value: &Value) -> Option<Coordinate> {
    let pair: Vec<f64> = match value {
        Value::String(s) => serde_json::from_str(s).ok()?,
        Value::Array(_) => serde_json::from_value(value.clone()).ok()?,
        _ => return None,
    };
    match pair.as_slice() {
        [lon, lat] => Coordinate::from_lon_lat(*lon, *lat),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::throttle::Unthrottled;
    use httpmock::prelude::*;
    use serde_json::json;

    fn provider(server: &MockServer) -> TgnProvider {
        let config = TgnConfig {
            endpoint: server.url("/sparql"),
            ..TgnConfig::default()
        };
        TgnProvider::new(&config, Duration::from_secs(5)).with_throttle(Unthrottled)
    }

    fn lod_body(value: &str) -> Value {
        json!({
            "id": "http://vocab.getty.edu/tgn/7005706",
            "identified_by": [
                { "type": "Name", "content": "Aucará" },
                { "type": "crm:E47_Spatial_Coordinates", "value": value }
            ]
        })
    }

    #[test]
    fn test_query_filters() {
        let server = MockServer::start();
        let tgn = provider(&server);

        let bare = tgn.build_query("Antequera", None, None);
        assert!(bare.contains("luc:term \"Antequera\""));
        assert!(!bare.contains("?pp1"));
        assert!(!bare.contains("gvp:placeType"));

        let filtered = tgn.build_query("Antequera", Some("MX"), Some("inhabited places"));
        assert!(filtered.contains("luc:term \"MX\""));
        assert!(filtered.contains("gvp:broaderPartitiveExtended ?pp1"));
        assert!(filtered.contains("[rdfs:label \"inhabited places\"@en]"));
    }

    #[test]
    fn test_query_escapes_literals() {
        let server = MockServer::start();
        let tgn = provider(&server);
        let q = tgn.build_query("Say \"hi\"", None, None);
        assert!(q.contains("luc:term \"Say \\\"hi\\\"\""));
    }

    #[test]
    fn test_search_reads_bindings() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/sparql")
                .query_param_exists("query")
                .header("Accept", "application/sparql-results+json");
            then.status(200).json_body(json!({
                "head": { "vars": ["p", "pLab"] },
                "results": { "bindings": [
                    { "p": { "type": "uri", "value": "http://vocab.getty.edu/tgn/7005706" },
                      "pLab": { "type": "literal", "value": "Aucará" } },
                    { "p": { "type": "uri", "value": "http://vocab.getty.edu/tgn/1000077" } }
                ] }
            }));
        });

        let candidates = provider(&server).search("Aucará", Some("Peru"), None).unwrap();
        mock.assert();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].label, "Aucará");
        assert_eq!(candidates[0].reference.as_deref(), Some("http://vocab.getty.edu/tgn/7005706"));
        assert_eq!(candidates[1].label, "");
    }

    #[test]
    fn test_search_failure_is_empty() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/sparql");
            then.status(500);
        });
        assert!(provider(&server).search("Aucará", None, None).unwrap().is_empty());
    }

    #[test]
    fn test_search_unexpected_shape_is_empty() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/sparql");
            then.status(200).json_body(json!({ "boolean": true }));
        });
        assert!(provider(&server).search("Aucará", None, None).unwrap().is_empty());
    }

    #[test]
    fn test_locate_swaps_lon_lat() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/tgn/7005706.json");
            then.status(200).json_body(lod_body("[-74.0833, -14.25]"));
        });
        let tgn = provider(&server);
        let candidate = Candidate::new("Aucará", Geometry::Missing).with_reference(server.url("/tgn/7005706"));
        let coord = tgn.locate(&candidate).unwrap();
        assert_eq!(coord.as_pair(), (-14.25, -74.0833));
    }

    #[test]
    fn test_locate_without_coordinates() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/tgn/1.json");
            then.status(200).json_body(json!({ "identified_by": [{ "type": "Name", "content": "x" }] }));
        });
        let tgn = provider(&server);
        let candidate = Candidate::new("x", Geometry::Missing).with_reference(server.url("/tgn/1"));
        assert_eq!(tgn.locate(&candidate), None);
        assert_eq!(tgn.locate(&Candidate::new("x", Geometry::Missing)), None);
    }

    #[test]
    fn test_best_match_first_acceptable_with_lazy_lookup() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(GET).path("/tgn/1.json");
            then.status(200).json_body(lod_body("[-96.72, 17.06]"));
        });
        let second = server.mock(|when, then| {
            when.method(GET).path("/tgn/2.json");
            then.status(200).json_body(lod_body("[-4.56, 37.02]"));
        });
        let tgn = provider(&server);
        let candidates = vec![
            Candidate::new("Antequera", Geometry::Missing).with_reference(server.url("/tgn/1")),
            Candidate::new("Antequera", Geometry::Missing).with_reference(server.url("/tgn/2")),
        ];
        let coord = tgn.best_match(&candidates, "antequera", 90.0).unwrap();
        assert_eq!(coord.as_pair(), (17.06, -96.72));
        first.assert();
        second.assert_hits(0);
    }

    #[test]
    fn test_parse_lon_lat() {
        assert_eq!(parse_lon_lat(&json!("[2.0, 1.0]")).map(|c| c.as_pair()), Some((1.0, 2.0)));
        assert_eq!(parse_lon_lat(&json!([2.0, 1.0])).map(|c| c.as_pair()), Some((1.0, 2.0)));
        assert_eq!(parse_lon_lat(&json!("[2.0]")), None);
        assert_eq!(parse_lon_lat(&json!("not a list")), None);
    }
}
