//! Resolve historical place names to coordinates using several gazetteers.
//!
//! ```no_run
//! use georesolver::{PlaceResolver, ResolverConfig};
//!
//! let config = ResolverConfig::load()?;
//! let resolver = PlaceResolver::from_config(&config)?;
//! if let Some(coord) = resolver.resolve("Aucará", Some("PE"), Some("pueblo"), true) {
//!     println!("{}", coord);
//! }
//! # Ok::<(), georesolver::ConfigError>(())
//! ```

pub mod config;
pub mod error;
pub mod location;
pub mod logging;

pub use config::ResolverConfig;
pub use error::{ConfigError, ProviderError};
pub use location::{Coordinate, PlaceQuery, PlaceResolver, Resolution, ServiceId};
pub use logging::{init_logging, init_logging_to};
