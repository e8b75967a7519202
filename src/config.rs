//! Resolver configuration at `<config dir>/georesolver/config.json`.
//!
//! Every field has a default, so a missing file means "all defaults".
//! Environment variables override the file.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ConfigError;
use crate::location::ServiceId;

pub const DEFAULT_THRESHOLD: f64 = 90.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum similarity score (0-100) for accepting a candidate
    pub threshold: f64,
    /// Place-type map; the bundled one is used when unset
    pub places_map: Option<PathBuf>,
    /// Providers in priority order
    pub services: Vec<ServiceId>,
    /// Per-request HTTP timeout
    pub timeout_secs: u64,
    pub tgn: TgnConfig,
    pub whg: WhgConfig,
    pub geonames: GeonamesConfig,
    pub wikidata: WikidataConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            places_map: None,
            services: ServiceId::ALL.to_vec(),
            timeout_secs: 10,
            tgn: TgnConfig::default(),
            whg: WhgConfig::default(),
            geonames: GeonamesConfig::default(),
            wikidata: WikidataConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TgnConfig {
    pub endpoint: String,
    /// Language tag of place-type labels in the SPARQL filter
    pub language: String,
    pub calls_per_second: u32,
}

impl Default for TgnConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://vocab.getty.edu/sparql".into(),
            language: "en".into(),
            calls_per_second: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhgConfig {
    pub endpoint: String,
    pub search_path: String,
    /// WHG dataset to restrict searches to; empty searches everything
    pub collection: String,
    pub calls_per_second: u32,
}

impl Default for WhgConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://whgazetteer.org/api".into(),
            search_path: "/index".into(),
            collection: String::new(),
            calls_per_second: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeonamesConfig {
    pub endpoint: String,
    pub username: Option<String>,
    pub max_rows: u32,
    pub calls_per_second: u32,
}

impl Default for GeonamesConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://api.geonames.org".into(),
            username: None,
            max_rows: 10,
            calls_per_second: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WikidataConfig {
    pub search_endpoint: String,
    /// Base URL that `<QID>.json` is appended to
    pub entity_endpoint: String,
    pub language: String,
    pub limit: u32,
    pub calls_per_second: u32,
}

impl Default for WikidataConfig {
    fn default() -> Self {
        Self {
            search_endpoint: "https://www.wikidata.org/w/api.php".into(),
            entity_endpoint: "https://www.wikidata.org/wiki/Special:EntityData/".into(),
            language: "en".into(),
            limit: 10,
            calls_per_second: 30,
        }
    }
}

impl ResolverConfig {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::read_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Load a specific file, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("georesolver").join("config.json"))
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "reading resolver config");
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("GEONAMES_USERNAME") {
            self.geonames.username = Some(v);
        }
        if let Some(v) = var("GEORESOLVER_TGN_ENDPOINT") {
            self.tgn.endpoint = v;
        }
        if let Some(v) = var("GEORESOLVER_WHG_ENDPOINT") {
            self.whg.endpoint = v;
        }
        if let Some(v) = var("GEORESOLVER_GEONAMES_ENDPOINT") {
            self.geonames.endpoint = v;
        }
        if let Some(v) = var("GEORESOLVER_WIKIDATA_SEARCH_ENDPOINT") {
            self.wikidata.search_endpoint = v;
        }
        if let Some(v) = var("GEORESOLVER_WIKIDATA_ENTITY_ENDPOINT") {
            self.wikidata.entity_endpoint = v;
        }
        if let Some(v) = var("GEORESOLVER_PLACES_MAP") {
            self.places_map = Some(PathBuf::from(v));
        }
        if let Some(v) = var("GEORESOLVER_THRESHOLD") {
            self.threshold = v.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("GEORESOLVER_THRESHOLD is not a number: '{}'", v))
            })?;
        }
        Ok(())
    }
}
