//! Place-type vocabulary translation.
//!
//! A generic label such as "pueblo" means different things to each service:
//! a TGN place-type label, a WHG/Geonames feature class, a Wikidata class QID.
//! The table is `{generic_type: {service_key: native_token}}`.

use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

const BUNDLED_PLACES_MAP: &str = include_str!("../../data/places_map.json");

/// Generic type used when a caller's type is unknown and a default filter is requested.
pub const DEFAULT_PLACE_TYPE: &str = "pueblo";

/// Immutable (place_type, service) → native token table.
#[derive(Debug, Clone)]
pub struct PlaceTypeMapper {
    mapping: Map<String, Value>,
}

impl PlaceTypeMapper {
    /// The mapping shipped with the crate.
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_json_str(BUNDLED_PLACES_MAP)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&data).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_value(value)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ConfigError::InvalidPlacesMap(e.to_string()))?;
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(mapping) => Ok(Self { mapping }),
            other => Err(ConfigError::InvalidPlacesMap(format!(
                "expected a JSON object at the top level, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Look up the native token for `place_type` on `service`.
    ///
    /// `place_type` is lower-cased; table keys are expected lowercase already.
    /// Any miss (unknown type, unknown service, malformed entry) is `None`.
    pub fn get_for_service(&self, place_type: &str, service: &str) -> Option<&str> {
        self.mapping
            .get(&place_type.to_lowercase())?
            .as_object()?
            .get(service)?
            .as_str()
    }

    /// Number of generic place types in the table.
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
