//! Place-name resolution against historical and modern gazetteers.
//!
//! Queries Getty TGN, the World Historical Gazetteer, Geonames and Wikidata
//! in priority order, translating generic place types per service and
//! fuzzy-matching candidate labels against the requested name.

pub mod matching;
pub mod place_types;
pub mod providers;
pub mod resolver;
pub mod throttle;
pub mod types;

pub use matching::MatchPolicy;
pub use place_types::{PlaceTypeMapper, DEFAULT_PLACE_TYPE};
pub use providers::{GeocodingProvider, GeonamesProvider, TgnProvider, WhgProvider, WikidataProvider};
pub use resolver::PlaceResolver;
pub use throttle::{RateLimit, Throttle, Unthrottled};
pub use types::{Candidate, Coordinate, Geometry, PlaceQuery, Resolution, ServiceId};
