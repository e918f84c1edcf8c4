//! GBFS station feed client.
//!
//! Reads the discovery document, then joins `station_information` with
//! `station_status` on `station_id` (left join: stations without a status
//! row keep default availability).

use std::collections::HashMap;
use std::time::Duration;

use bluedock_core::{FeedError, ReqwestErrorExt};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::geo::Coordinate;
use crate::retry::{with_retry, RetryConfig};

const STATION_INFORMATION: &str = "station_information";
const STATION_STATUS: &str = "station_status";
const PREFERRED_LANGUAGE: &str = "en";

/// One dockable station with its live availability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub station_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub capacity: Option<u32>,
    pub num_bikes_available: u32,
    pub num_ebikes_available: u32,
    pub num_docks_available: u32,
    pub is_renting: bool,
    pub is_returning: bool,
}

impl Station {
    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }

    /// Classic (non-electric) bikes available.
    pub fn regular_bikes(&self) -> u32 {
        self.num_bikes_available
            .saturating_sub(self.num_ebikes_available)
    }

    /// Copy the live counters from a fresher record of the same station.
    pub fn update_availability(&mut self, current: &Station) {
        self.num_bikes_available = current.num_bikes_available;
        self.num_ebikes_available = current.num_ebikes_available;
        self.num_docks_available = current.num_docks_available;
        self.is_renting = current.is_renting;
        self.is_returning = current.is_returning;
    }
}

/// All stations from one feed fetch.
#[derive(Debug, Clone)]
pub struct StationSnapshot {
    pub stations: Vec<Station>,
    pub fetched_at: DateTime<Utc>,
}

impl StationSnapshot {
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn by_id(&self) -> HashMap<&str, &Station> {
        self.stations
            .iter()
            .map(|s| (s.station_id.as_str(), s))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    data: Value,
}

#[derive(Debug, Deserialize)]
struct StationsEnvelope {
    data: StationsData,
}

#[derive(Debug, Deserialize)]
struct StationsData {
    #[serde(default)]
    stations: Vec<Value>,
}

/// Feeds disagree on whether ids are strings or numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StationId {
    Text(String),
    Number(i64),
}

impl StationId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

/// GBFS 1.x uses 0/1, later versions use booleans.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InformationRow {
    station_id: StationId,
    name: Option<String>,
    lat: f64,
    lon: f64,
    capacity: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StatusRow {
    station_id: StationId,
    num_bikes_available: Option<u32>,
    num_ebikes_available: Option<u32>,
    num_docks_available: Option<u32>,
    is_renting: Option<Flag>,
    is_returning: Option<Flag>,
}

#[derive(Debug, Clone)]
pub struct GbfsClient {
    client: Client,
    discovery_url: String,
    retry: RetryConfig,
}

impl GbfsClient {
    pub fn new(discovery_url: &str, timeout: Duration, user_agent: &str) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| FeedError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            discovery_url: discovery_url.to_string(),
            retry: RetryConfig::feed(),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch and join the station information and status feeds.
    #[instrument(skip(self), fields(url = %self.discovery_url))]
    pub async fn fetch_stations(&self) -> Result<StationSnapshot, FeedError> {
        tracing::info!("Fetching live station data");

        let discovery: FeedEnvelope = self.get_json(&self.discovery_url).await?;
        let feeds = discover_feeds(&discovery.data)?;

        let info_url = feeds
            .get(STATION_INFORMATION)
            .ok_or_else(|| FeedError::MissingFeed(STATION_INFORMATION.to_string()))?;
        let status_url = feeds
            .get(STATION_STATUS)
            .ok_or_else(|| FeedError::MissingFeed(STATION_STATUS.to_string()))?;

        let info: StationsEnvelope = self.get_json(info_url).await?;
        let status: StationsEnvelope = self.get_json(status_url).await?;

        let stations = join_stations(info.data.stations, status.data.stations);
        tracing::info!("Fetched data for {} stations", stations.len());

        Ok(StationSnapshot {
            stations,
            fetched_at: Utc::now(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FeedError> {
        let response = with_retry(&self.retry, || self.client.get(url).send())
            .await
            .map_err(|e| FeedError::Unavailable(e.into_network_error().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Unavailable(format!("{} returned {}", url, status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Unavailable(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| FeedError::Malformed(format!("{}: {}", url, e)))
    }
}

/// Map feed name to URL. Handles GBFS 1.x/2.x (`data.<lang>.feeds`) and
/// 3.x (`data.feeds`) discovery layouts. Without English, the first
/// language in document order is used.
fn discover_feeds(data: &Value) -> Result<HashMap<String, String>, FeedError> {
    let feeds = data
        .get("feeds")
        .or_else(|| data.get(PREFERRED_LANGUAGE).and_then(|lang| lang.get("feeds")))
        .or_else(|| {
            data.as_object()
                .and_then(|langs| langs.values().find_map(|lang| lang.get("feeds")))
        })
        .and_then(Value::as_array)
        .ok_or_else(|| FeedError::Malformed("discovery document lists no feeds".to_string()))?;

    Ok(feeds
        .iter()
        .filter_map(|feed| {
            let name = feed.get("name")?.as_str()?;
            let url = feed.get("url")?.as_str()?;
            Some((name.to_string(), url.to_string()))
        })
        .collect())
}

fn parse_rows<T: DeserializeOwned>(rows: Vec<Value>, feed: &str) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::debug!("Skipping malformed {} row: {}", feed, e);
                None
            }
        })
        .collect()
}

fn join_stations(info_rows: Vec<Value>, status_rows: Vec<Value>) -> Vec<Station> {
    let mut status_by_id: HashMap<String, StatusRow> = parse_rows::<StatusRow>(status_rows, STATION_STATUS)
        .into_iter()
        .map(|row| {
            let id = match &row.station_id {
                StationId::Text(s) => s.clone(),
                StationId::Number(n) => n.to_string(),
            };
            (id, row)
        })
        .collect();

    parse_rows::<InformationRow>(info_rows, STATION_INFORMATION)
        .into_iter()
        .map(|info| {
            let station_id = info.station_id.into_string();
            let status = status_by_id.remove(&station_id);
            let status = status.as_ref();

            Station {
                name: info.name.unwrap_or_else(|| "Unknown".to_string()),
                lat: info.lat,
                lon: info.lon,
                capacity: info.capacity,
                num_bikes_available: status.and_then(|s| s.num_bikes_available).unwrap_or(0),
                num_ebikes_available: status.and_then(|s| s.num_ebikes_available).unwrap_or(0),
                num_docks_available: status.and_then(|s| s.num_docks_available).unwrap_or(0),
                is_renting: status
                    .and_then(|s| s.is_renting.as_ref())
                    .map_or(true, Flag::as_bool),
                is_returning: status
                    .and_then(|s| s.is_returning.as_ref())
                    .map_or(true, Flag::as_bool),
                station_id,
            }
        })
        .collect()
}
