use std::path::PathBuf;
use thiserror::Error;

use crate::location::ServiceId;

/// Construction-time failures. A resolver cannot be built past one of these.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid place-type map: {0}")]
    InvalidPlacesMap(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A provider refused a query before talking to its service.
///
/// Transport and format failures never show up here; providers log them and
/// return an empty result set instead.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{service} rejected query: {message}")]
    InvalidQuery { service: ServiceId, message: String },
}
