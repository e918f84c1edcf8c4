//! Forward geocoding: turn a typed address into coordinates.
//! Uses Nominatim (OpenStreetMap) - free, no API key required.
//!
//! Street intersections ("Ruggles St and Huntington Ave") rarely match as
//! typed, so several phrasings are tried in order until one resolves.

use std::collections::HashMap;
use std::time::Duration;

use bluedock_core::{GeocodeError, GeocodedLocation, ReqwestErrorExt};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::retry::{with_retry, RetryConfig};

const INTERSECTION_KEYWORDS: [&str; 4] = [" and ", " & ", " @ ", " at "];

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

/// Lower-cased words of `text`, split on anything that is not alphanumeric.
fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// True if every word of `phrase` appears, in order, inside `text`.
fn mentions(text: &str, phrase: &str) -> bool {
    let haystack = words(text);
    let needle = words(phrase);
    !needle.is_empty()
        && haystack
            .windows(needle.len())
            .any(|window| window == needle.as_slice())
}

/// Locality parts, e.g. "Boston, MA" -> ["Boston", "MA"].
fn locality_parts(locality: &str) -> Vec<&str> {
    locality
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// The address already names the city or region of the locality.
fn names_locality(address: &str, locality: &str) -> bool {
    locality_parts(locality).iter().any(|part| mentions(address, part))
}

/// The address already names the city (first locality part).
fn names_city(address: &str, locality: &str) -> bool {
    locality_parts(locality)
        .first()
        .is_some_and(|city| mentions(address, city))
}

pub fn is_intersection(address: &str) -> bool {
    let lowered = address.to_lowercase();
    INTERSECTION_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Queries to try for `address`, most specific first.
pub fn candidate_queries(address: &str, locality: &str) -> Vec<String> {
    let address = address.trim();
    let with_locality = |text: &str| {
        if locality.trim().is_empty() {
            text.to_string()
        } else {
            format!("{}, {}", text, locality.trim())
        }
    };

    if !is_intersection(address) {
        return if names_locality(address, locality) {
            vec![address.to_string()]
        } else {
            vec![with_locality(address)]
        };
    }

    let normalized = INTERSECTION_KEYWORDS
        .iter()
        .fold(address.to_lowercase(), |acc, keyword| acc.replace(keyword, " and "));

    let mut queries = if names_locality(&normalized, locality) {
        vec![normalized.clone(), address.to_string()]
    } else {
        vec![with_locality(&normalized), with_locality(address)]
    };

    let streets: Vec<&str> = normalized.split(" and ").map(str::trim).collect();
    if let [first, second] = streets.as_slice() {
        let suffix = |text: String| {
            if names_city(&normalized, locality) {
                text
            } else {
                with_locality(&text)
            }
        };
        queries.extend([
            suffix(format!("{} & {}", first, second)),
            suffix(format!("{} at {}", first, second)),
            suffix(format!("intersection of {} and {}", first, second)),
            suffix(format!("{}/{}", first, second)),
        ]);
    }

    let mut seen = std::collections::HashSet::new();
    queries.retain(|q| seen.insert(q.clone()));
    queries
}

pub struct Geocoder {
    client: Client,
    search_url: String,
    locality: String,
    retry: RetryConfig,
    cache: HashMap<String, Option<GeocodedLocation>>,
}

impl Geocoder {
    pub fn new(
        search_url: &str,
        user_agent: &str,
        locality: &str,
        timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| GeocodeError::Unavailable(format!("Failed to create geocoding client: {}", e)))?;

        Ok(Self {
            client,
            search_url: search_url.to_string(),
            locality: locality.to_string(),
            retry: RetryConfig::geocoder(),
            cache: HashMap::new(),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve an address. Both hits and misses are cached per address;
    /// a lookup where every query failed in transport is not.
    #[instrument(skip(self), level = "info")]
    pub async fn geocode(&mut self, address: &str) -> Result<GeocodedLocation, GeocodeError> {
        if let Some(cached) = self.cache.get(address) {
            return cached
                .clone()
                .ok_or_else(|| GeocodeError::NotFound(address.to_string()));
        }

        let mut answered = false;
        let mut last_error = None;

        for query in candidate_queries(address, &self.locality) {
            match self.search(&query).await {
                Ok(Some(location)) => {
                    tracing::info!("Geocoded {:?} via {:?}", address, query);
                    self.cache.insert(address.to_string(), Some(location.clone()));
                    return Ok(location);
                }
                Ok(None) => answered = true,
                Err(e) => {
                    tracing::debug!("Geocode query {:?} failed: {}", query, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !answered => Err(e),
            _ => {
                self.cache.insert(address.to_string(), None);
                Err(GeocodeError::NotFound(address.to_string()))
            }
        }
    }

    /// Single Nominatim query; `Ok(None)` when nothing matched.
    async fn search(&self, query: &str) -> Result<Option<GeocodedLocation>, GeocodeError> {
        let params = [("q", query), ("format", "json"), ("limit", "1")];
        let response = with_retry(&self.retry, || {
            self.client.get(&self.search_url).query(&params).send()
        })
        .await
        .map_err(|e| GeocodeError::Unavailable(e.into_network_error().to_string()))?;

        if !response.status().is_success() {
            return Err(GeocodeError::Unavailable(format!(
                "geocoder returned {}",
                response.status()
            )));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| GeocodeError::Unavailable(format!("Unexpected geocoder response: {}", e)))?;

        Ok(places.into_iter().find_map(|place| {
            let lat = place.lat.parse::<f64>().ok()?;
            let lon = place.lon.parse::<f64>().ok()?;
            Some(GeocodedLocation {
                lat,
                lon,
                formatted_address: place.display_name.unwrap_or_else(|| query.to_string()),
            })
        }))
    }

    /// Seed the cache, e.g. with a favorite's stored result.
    pub fn remember(&mut self, address: &str, location: GeocodedLocation) {
        self.cache.insert(address.to_string(), Some(location));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LOCALITY: &str = "Boston, MA";

    fn geocoder_for(server: &MockServer) -> Geocoder {
        Geocoder::new(
            &format!("{}/search", server.uri()),
            "bluedock-test",
            LOCALITY,
            Duration::from_secs(5),
        )
        .unwrap()
        .with_retry_config(RetryConfig::none())
    }

    #[test]
    fn test_plain_address_gets_locality() {
        assert_eq!(
            candidate_queries("100 Main St", LOCALITY),
            vec!["100 Main St, Boston, MA"]
        );
    }

    #[test]
    fn test_address_with_city_is_untouched() {
        assert_eq!(
            candidate_queries("1 City Hall Sq, Boston", LOCALITY),
            vec!["1 City Hall Sq, Boston"]
        );
        assert_eq!(
            candidate_queries("Kendall Sq, Cambridge MA", LOCALITY),
            vec!["Kendall Sq, Cambridge MA"]
        );
    }

    #[test]
    fn test_intersection_variants() {
        let queries = candidate_queries("Ruggles St & Huntington Ave", LOCALITY);
        assert_eq!(
            queries,
            vec![
                "ruggles st and huntington ave, Boston, MA",
                "Ruggles St & Huntington Ave, Boston, MA",
                "ruggles st & huntington ave, Boston, MA",
                "ruggles st at huntington ave, Boston, MA",
                "intersection of ruggles st and huntington ave, Boston, MA",
                "ruggles st/huntington ave, Boston, MA",
            ]
        );
    }

    #[test]
    fn test_intersection_with_city_named() {
        let queries = candidate_queries("Mass Ave at Beacon St Boston", LOCALITY);
        assert_eq!(queries[0], "mass ave and beacon st boston");
        assert_eq!(queries[1], "Mass Ave at Beacon St Boston");
        assert!(queries.contains(&"mass ave & beacon st boston".to_string()));
    }

    #[test]
    fn test_intersection_keyword_detection() {
        assert!(is_intersection("A St @ B St"));
        assert!(is_intersection("Main AND Elm"));
        assert!(!is_intersection("Atlantic Ave"));
        assert!(!is_intersection("Anderson St"));
    }

    #[test]
    fn test_empty_locality() {
        assert_eq!(candidate_queries("Elm St", ""), vec!["Elm St"]);
    }

    #[tokio::test]
    async fn test_geocode_success_and_cache() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "100 Main St, Boston, MA"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"lat": "42.3702", "lon": "-71.0770", "display_name": "100 Main Street, Charlestown, Boston"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let mut geocoder = geocoder_for(&server);
        let first = geocoder.geocode("100 Main St").await.unwrap();
        assert_eq!(first.lat, 42.3702);
        assert_eq!(first.formatted_address, "100 Main Street, Charlestown, Boston");

        let second = geocoder.geocode("100 Main St").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_intersection_falls_through_candidates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "intersection of ruggles st and huntington ave, Boston, MA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"lat": "42.3378", "lon": "-71.0892", "display_name": "Ruggles"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let mut geocoder = geocoder_for(&server);
        let location = geocoder.geocode("Ruggles St and Huntington Ave").await.unwrap();
        assert_eq!(location.lon, -71.0892);
    }

    #[tokio::test]
    async fn test_not_found_is_cached() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let mut geocoder = geocoder_for(&server);
        let first = geocoder.geocode("Nowhere Lane").await;
        let second = geocoder.geocode("Nowhere Lane").await;

        assert!(matches!(first, Err(GeocodeError::NotFound(_))));
        assert_eq!(
            second.unwrap_err().to_string(),
            "Could not find location for: Nowhere Lane"
        );
    }

    #[tokio::test]
    async fn test_service_down_is_unavailable_and_not_cached() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let mut geocoder = geocoder_for(&server);
        assert!(matches!(
            geocoder.geocode("Elm St").await,
            Err(GeocodeError::Unavailable(_))
        ));
        assert!(geocoder.geocode("Elm St").await.is_err());
    }

    #[tokio::test]
    async fn test_remembered_location_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mut geocoder = geocoder_for(&server);
        let loc = GeocodedLocation::from_coordinates(42.35, -71.06);
        geocoder.remember("Map Location 42.3500, -71.0600", loc.clone());

        let found = geocoder.geocode("Map Location 42.3500, -71.0600").await.unwrap();
        assert_eq!(found, loc);
    }
}
