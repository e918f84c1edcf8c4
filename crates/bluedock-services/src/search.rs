//! Nearby-station search: straight-line pre-filter, routed walking
//! distances, and a per-location cache of the walkable result.
//!
//! A cached search keeps its stations and walking distances; only the
//! availability counters are refreshed from the latest feed snapshot.

use std::collections::HashMap;

use bluedock_core::FeedError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use crate::gbfs::{GbfsClient, Station, StationSnapshot};
use crate::geo::{bearing_degrees, haversine_miles, Coordinate, Direction};
use crate::routing::{RouteOutcome, RoutingClient};

pub const DEFAULT_AREA_LABEL: &str = "Search Location";

#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Label attached to each result ("area")
    pub label: String,
    pub origin: Coordinate,
    pub radius_miles: f64,
    pub direction: Direction,
    /// Ignore a cached result and route again
    pub force_refresh: bool,
}

impl SearchQuery {
    pub fn new(origin: Coordinate, radius_miles: f64, direction: Direction) -> Self {
        Self {
            label: DEFAULT_AREA_LABEL.to_string(),
            origin,
            radius_miles,
            direction,
            force_refresh: false,
        }
    }

    /// `lat_lon_radius_direction`, coordinates rounded to 6 decimals.
    pub fn cache_key(&self) -> String {
        format!(
            "{:.6}_{:.6}_{}_{}",
            self.origin.lat,
            self.origin.lon,
            self.radius_miles,
            self.direction.name()
        )
    }
}

/// A station that can be walked to from the search origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyStation {
    #[serde(flatten)]
    pub station: Station,
    pub straight_distance_miles: f64,
    pub walking_distance_miles: f64,
    pub area: String,
}

/// Why candidates inside the radius were dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterSummary {
    /// Stations inside the straight-line radius and direction
    pub candidates: usize,
    /// No usable route, or a route failing the barrier heuristic
    pub blocked_by_barriers: usize,
    /// Routed distance longer than the radius
    pub too_far: usize,
}

impl FilterSummary {
    /// "Filtered out: 2 blocked by barriers, 1 too far to walk"
    pub fn caption(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.blocked_by_barriers > 0 {
            parts.push(format!("{} blocked by barriers", self.blocked_by_barriers));
        }
        if self.too_far > 0 {
            parts.push(format!("{} too far to walk", self.too_far));
        }
        if parts.is_empty() {
            None
        } else {
            Some(format!("Filtered out: {}", parts.join(", ")))
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResult {
    /// Sorted by walking distance, nearest first
    pub stations: Vec<NearbyStation>,
    /// Served from the location cache with refreshed availability
    pub from_cache: bool,
    pub summary: FilterSummary,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

pub struct StationFinder {
    feed: GbfsClient,
    router: RoutingClient,
    snapshot: Option<StationSnapshot>,
    cache: HashMap<String, Vec<NearbyStation>>,
}

impl StationFinder {
    pub fn new(feed: GbfsClient, router: RoutingClient) -> Self {
        Self {
            feed,
            router,
            snapshot: None,
            cache: HashMap::new(),
        }
    }

    /// Refetch the station feed. On failure the previous snapshot is kept.
    pub async fn refresh(&mut self) -> Result<usize, FeedError> {
        let snapshot = self.feed.fetch_stations().await?;
        let count = snapshot.stations.len();
        self.snapshot = Some(snapshot);
        Ok(count)
    }

    /// Fetch the feed if it has never been loaded.
    pub async fn ensure_loaded(&mut self) -> Result<(), FeedError> {
        if self.snapshot.is_none() {
            self.refresh().await?;
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Option<&StationSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.snapshot.as_ref().map(|s| s.fetched_at)
    }

    pub fn cached_searches(&self) -> usize {
        self.cache.len()
    }

    pub fn router(&self) -> &RoutingClient {
        &self.router
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.router.clear_cache();
    }

    /// Find walkable stations around the query origin.
    #[instrument(skip(self, query), fields(key = %query.cache_key()))]
    pub async fn find_nearby(&mut self, query: &SearchQuery) -> SearchResult {
        let snapshot = match &self.snapshot {
            Some(s) if !s.is_empty() => s,
            _ => return SearchResult::default(),
        };

        let key = query.cache_key();
        if !query.force_refresh {
            if let Some(cached) = self.cache.get(&key) {
                let refreshed = refresh_availability(cached, snapshot);
                if !refreshed.is_empty() {
                    tracing::info!("Updated availability for {} cached stations", refreshed.len());
                    return SearchResult {
                        stations: refreshed,
                        from_cache: true,
                        summary: FilterSummary::default(),
                    };
                }
                tracing::info!("Cached stations are gone from the feed, recalculating routes");
                self.cache.remove(&key);
            }
        }

        let candidates = straight_line_candidates(&snapshot.stations, query);
        let mut summary = FilterSummary {
            candidates: candidates.len(),
            ..FilterSummary::default()
        };
        tracing::debug!("Found {} nearby stations", candidates.len());

        let mut walkable = Vec::new();
        for (station, straight) in candidates {
            let outcome = self
                .router
                .walking_distance(query.origin, station.position())
                .await;

            let walking = match outcome {
                Ok(RouteOutcome::Walkable(miles)) => miles,
                Ok(RouteOutcome::Blocked { walking_miles, .. }) => {
                    tracing::debug!(
                        "{} blocked: {:.2} mi walk vs {:.2} mi straight",
                        station.name,
                        walking_miles,
                        straight
                    );
                    summary.blocked_by_barriers += 1;
                    continue;
                }
                Ok(RouteOutcome::NoRoute) => {
                    summary.blocked_by_barriers += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Routing error for {}: {}", station.name, e);
                    summary.blocked_by_barriers += 1;
                    continue;
                }
            };

            if walking > query.radius_miles {
                summary.too_far += 1;
                continue;
            }

            walkable.push(NearbyStation {
                station,
                straight_distance_miles: straight,
                walking_distance_miles: walking,
                area: query.label.clone(),
            });
        }

        sort_by_walking_distance(&mut walkable);
        tracing::info!("Found {} walkable stations", walkable.len());

        if !walkable.is_empty() {
            self.cache.insert(key, walkable.clone());
        }

        SearchResult {
            stations: walkable,
            from_cache: false,
            summary,
        }
    }
}

/// Stations inside the radius (and direction sector) with their
/// straight-line distance, in feed order.
pub fn straight_line_candidates(stations: &[Station], query: &SearchQuery) -> Vec<(Station, f64)> {
    stations
        .iter()
        .filter(|station| station.position().is_valid())
        .filter_map(|station| {
            let straight = haversine_miles(query.origin, station.position());
            if straight > query.radius_miles {
                return None;
            }
            if query.direction != Direction::All {
                let bearing = bearing_degrees(query.origin, station.position());
                if !query.direction.contains(bearing) {
                    return None;
                }
            }
            Some((station.clone(), straight))
        })
        .collect()
}

fn refresh_availability(cached: &[NearbyStation], snapshot: &StationSnapshot) -> Vec<NearbyStation> {
    let current = snapshot.by_id();
    let mut refreshed: Vec<NearbyStation> = cached
        .iter()
        .filter_map(|nearby| {
            let live = current.get(nearby.station.station_id.as_str())?;
            let mut updated = nearby.clone();
            updated.station.update_availability(live);
            Some(updated)
        })
        .collect();
    sort_by_walking_distance(&mut refreshed);
    refreshed
}

fn sort_by_walking_distance(stations: &mut [NearbyStation]) {
    stations.sort_by(|a, b| a.walking_distance_miles.total_cmp(&b.walking_distance_miles));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: &str, lat: f64, lon: f64) -> Station {
        Station {
            station_id: id.to_string(),
            name: format!("Station {}", id),
            lat,
            lon,
            capacity: Some(15),
            num_bikes_available: 3,
            num_ebikes_available: 1,
            num_docks_available: 12,
            is_renting: true,
            is_returning: true,
        }
    }

    const ORIGIN: Coordinate = Coordinate {
        lat: 42.3601,
        lon: -71.0589,
    };

    #[test]
    fn test_cache_key_format() {
        let query = SearchQuery::new(ORIGIN, 0.5, Direction::Northeast);
        assert_eq!(query.cache_key(), "42.360100_-71.058900_0.5_northeast");
    }

    #[test]
    fn test_candidates_respect_radius() {
        let stations = vec![
            station("near", 42.3621, -71.0589),
            station("far", 42.3801, -71.0589),
        ];
        let query = SearchQuery::new(ORIGIN, 0.5, Direction::All);
        let found = straight_line_candidates(&stations, &query);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.station_id, "near");
        assert!(found[0].1 < 0.5);
    }

    #[test]
    fn test_candidates_respect_direction() {
        let stations = vec![
            station("north", 42.3631, -71.0589),
            station("south", 42.3571, -71.0589),
            station("east", 42.3601, -71.0549),
        ];
        let query = SearchQuery::new(ORIGIN, 1.0, Direction::North);
        let found = straight_line_candidates(&stations, &query);

        let ids: Vec<_> = found.iter().map(|(s, _)| s.station_id.as_str()).collect();
        assert_eq!(ids, vec!["north"]);
    }

    #[test]
    fn test_candidates_skip_invalid_coordinates() {
        let stations = vec![station("zero", f64::NAN, 0.0)];
        let query = SearchQuery::new(ORIGIN, 2.0, Direction::All);
        assert!(straight_line_candidates(&stations, &query).is_empty());
    }

    #[test]
    fn test_refresh_availability_drops_missing_and_sorts() {
        let cached = vec![
            NearbyStation {
                station: station("b", 42.361, -71.058),
                straight_distance_miles: 0.2,
                walking_distance_miles: 0.4,
                area: DEFAULT_AREA_LABEL.into(),
            },
            NearbyStation {
                station: station("gone", 42.362, -71.058),
                straight_distance_miles: 0.1,
                walking_distance_miles: 0.1,
                area: DEFAULT_AREA_LABEL.into(),
            },
            NearbyStation {
                station: station("a", 42.360, -71.057),
                straight_distance_miles: 0.1,
                walking_distance_miles: 0.2,
                area: DEFAULT_AREA_LABEL.into(),
            },
        ];

        let mut live_a = station("a", 42.360, -71.057);
        live_a.num_bikes_available = 9;
        let snapshot = StationSnapshot {
            stations: vec![station("b", 42.361, -71.058), live_a],
            fetched_at: Utc::now(),
        };

        let refreshed = refresh_availability(&cached, &snapshot);
        let ids: Vec<_> = refreshed.iter().map(|n| n.station.station_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(refreshed[0].station.num_bikes_available, 9);
        assert_eq!(refreshed[0].walking_distance_miles, 0.2);
    }

    #[test]
    fn test_filter_caption() {
        assert_eq!(FilterSummary::default().caption(), None);

        let summary = FilterSummary {
            candidates: 6,
            blocked_by_barriers: 2,
            too_far: 1,
        };
        assert_eq!(
            summary.caption().unwrap(),
            "Filtered out: 2 blocked by barriers, 1 too far to walk"
        );

        let only_far = FilterSummary {
            candidates: 1,
            blocked_by_barriers: 0,
            too_far: 1,
        };
        assert_eq!(only_far.caption().unwrap(), "Filtered out: 1 too far to walk");
    }
}
