//! Walking distances from an OSRM route service.
//!
//! Routes much longer than the straight line usually mean a river, rail
//! yard or highway sits between the two points. Those are reported as
//! [`RouteOutcome::Blocked`] rather than walkable.

use std::collections::HashMap;
use std::time::Duration;

use bluedock_core::{ReqwestErrorExt, RoutingError};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::geo::{haversine_miles, Coordinate};

pub const METERS_TO_MILES: f64 = 0.000621371;
pub const DEFAULT_BARRIER_RATIO: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteOutcome {
    /// Walking distance in miles
    Walkable(f64),
    /// A route exists but exceeds the barrier ratio
    Blocked { walking_miles: f64, straight_miles: f64 },
    /// The router found no route
    NoRoute,
}

impl RouteOutcome {
    pub fn walking_miles(&self) -> Option<f64> {
        match self {
            Self::Walkable(miles) => Some(*miles),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
}

pub struct RoutingClient {
    client: Client,
    base_url: String,
    barrier_ratio: f64,
    cache: HashMap<String, RouteOutcome>,
    requests_sent: usize,
}

impl RoutingClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        user_agent: &str,
        barrier_ratio: f64,
    ) -> Result<Self, RoutingError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| RoutingError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            barrier_ratio,
            cache: HashMap::new(),
            requests_sent: 0,
        })
    }

    fn cache_key(from: Coordinate, to: Coordinate) -> String {
        format!("{}->{}", from.cache_key(), to.cache_key())
    }

    /// Walking distance between two points, consulting the cache first.
    ///
    /// Definitive answers are cached; transport errors are not, so the
    /// next search asks again.
    #[instrument(skip(self), level = "debug")]
    pub async fn walking_distance(
        &mut self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<RouteOutcome, RoutingError> {
        let key = Self::cache_key(from, to);
        if let Some(outcome) = self.cache.get(&key) {
            return Ok(*outcome);
        }

        let outcome = self.request_route(from, to).await?;
        self.cache.insert(key, outcome);
        Ok(outcome)
    }

    async fn request_route(
        &mut self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<RouteOutcome, RoutingError> {
        let url = format!(
            "{}/{},{};{},{}",
            self.base_url, from.lon, from.lat, to.lon, to.lat
        );

        self.requests_sent += 1;
        let response = self
            .client
            .get(&url)
            .query(&[
                ("overview", "false"),
                ("geometries", "geojson"),
                ("steps", "false"),
                ("annotations", "false"),
            ])
            .send()
            .await
            .map_err(|e| RoutingError::Unavailable(e.into_network_error().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RoutingError::Unavailable(e.to_string()))?;

        // OSRM answers "no route" style failures with 400 and a JSON code.
        let parsed: OsrmResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(RoutingError::Unavailable(format!("router returned {}", status)))
            }
            Err(e) => return Err(RoutingError::InvalidResponse(e.to_string())),
        };

        if status.is_server_error() {
            return Err(RoutingError::Unavailable(format!("router returned {}", status)));
        }

        let route = match parsed.routes.first() {
            Some(route) if parsed.code == "Ok" => route,
            _ => {
                tracing::debug!("No walking route ({}) to {}", parsed.code, to.cache_key());
                return Ok(RouteOutcome::NoRoute);
            }
        };

        Ok(classify_route(
            route.distance * METERS_TO_MILES,
            haversine_miles(from, to),
            self.barrier_ratio,
        ))
    }

    /// Number of HTTP requests made so far (cache hits excluded).
    pub fn requests_sent(&self) -> usize {
        self.requests_sent
    }

    pub fn cached_routes(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

/// Apply the barrier heuristic to a routed distance.
pub fn classify_route(walking_miles: f64, straight_miles: f64, barrier_ratio: f64) -> RouteOutcome {
    if walking_miles > straight_miles * barrier_ratio {
        RouteOutcome::Blocked {
            walking_miles,
            straight_miles,
        }
    } else {
        RouteOutcome::Walkable(walking_miles)
    }
}
