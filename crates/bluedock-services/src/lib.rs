//! Clients for the public services Bluedock depends on (GBFS station feed,
//! OSRM walking router, Nominatim geocoder) and the nearby-station search
//! built on top of them.

pub mod gbfs;
pub mod geo;
pub mod geocode;
pub mod retry;
pub mod routing;
pub mod search;

pub use gbfs::{GbfsClient, Station, StationSnapshot};
pub use geo::{bearing_degrees, haversine_miles, Coordinate, Direction};
pub use geocode::{candidate_queries, Geocoder};
pub use retry::{RetryConfig, RetryOn};
pub use routing::{RouteOutcome, RoutingClient};
pub use search::{FilterSummary, NearbyStation, SearchQuery, SearchResult, StationFinder};
