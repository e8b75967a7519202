//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Which gazetteer service a provider talks to.
///
/// The lowercase key doubles as the column name in the place-type map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceId {
    Tgn,
    Whg,
    Geonames,
    Wikidata,
}

impl ServiceId {
    pub const ALL: [ServiceId; 4] = [Self::Tgn, Self::Whg, Self::Geonames, Self::Wikidata];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tgn => "tgn",
            Self::Whg => "whg",
            Self::Geonames => "geonames",
            Self::Wikidata => "wikidata",
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tgn => write!(f, "TGN"),
            Self::Whg => write!(f, "WHG"),
            Self::Geonames => write!(f, "Geonames"),
            Self::Wikidata => write!(f, "Wikidata"),
        }
    }
}

/// A validated (latitude, longitude) pair.
///
/// Only constructible through [`Coordinate::new`], so both halves are always
/// present and in range. "No result" is `Option::<Coordinate>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some(Self { lat, lon })
    }

    /// Build from a `[lon, lat]` pair as used by GeoJSON and linked-data payloads.
    pub fn from_lon_lat(lon: f64, lat: f64) -> Option<Self> {
        Self::new(lat, lon)
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn as_pair(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

/// The input to a resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceQuery {
    pub place_name: String,
    /// ISO 3166-1 alpha-2 country code (e.g. "MX", "PE")
    pub country_code: Option<String>,
    /// Generic place-type label (e.g. "pueblo"), translated per service
    pub place_type: Option<String>,
}

impl PlaceQuery {
    pub fn new(place_name: impl Into<String>) -> Self {
        Self {
            place_name: place_name.into(),
            ..Self::default()
        }
    }

    pub fn with_country(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = Some(country_code.into());
        self
    }

    pub fn with_place_type(mut self, place_type: impl Into<String>) -> Self {
        self.place_type = Some(place_type.into());
        self
    }
}

/// Where a candidate sits, as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coordinate),
    /// Several geometries; only point members are usable.
    Collection(Vec<Geometry>),
    /// A geometry type we don't extract a coordinate from (e.g. "Polygon").
    Other(String),
    Missing,
}

impl Geometry {
    /// The usable point of this geometry, if any.
    ///
    /// A collection yields its first point member. A collection without
    /// one is skipped rather than guessed.
    pub fn point(&self) -> Option<Coordinate> {
        match self {
            Self::Point(c) => Some(*c),
            Self::Collection(members) => {
                let first = members.iter().find_map(|g| match g {
                    Self::Point(c) => Some(*c),
                    _ => None,
                });
                if first.is_none() {
                    warn!(members = members.len(), "geometry collection has no point member");
                }
                first
            }
            Self::Other(_) | Self::Missing => None,
        }
    }
}

/// One result record from a provider search, normalised to a uniform shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub label: String,
    pub alt_labels: Vec<String>,
    pub geometry: Geometry,
    /// Provider-specific handle for a lazy coordinate lookup
    /// (TGN concept URI, Wikidata QID).
    pub reference: Option<String>,
}

impl Candidate {
    pub fn new(label: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            label: label.into(),
            alt_labels: Vec::new(),
            geometry,
            reference: None,
        }
    }

    pub fn with_alt_labels(mut self, alt_labels: Vec<String>) -> Self {
        self.alt_labels = alt_labels;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// A resolved coordinate together with the service that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Resolution {
    pub coordinate: Coordinate,
    pub source: ServiceId,
}
