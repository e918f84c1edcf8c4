//! One user's working state: the service clients and their caches, the
//! preferences file, and the current pickup and dropoff searches.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bluedock_core::{
    AppError, Config, ConfigError, Favorite, GeocodedLocation, Preferences, SearchConfig,
    SearchMode,
};
use bluedock_services::{
    haversine_miles, Coordinate, Direction, GbfsClient, Geocoder, RoutingClient, SearchQuery,
    SearchResult, StationFinder,
};
use bluedock_weather::{CurrentWeather, WeatherProvider};
use chrono::{DateTime, Utc};

use crate::error_mapping::weather_error;

/// Environment variable consulted for the weather API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Pick the weather API key: explicit flag, then environment, then the
/// remembered preference. Blank values are skipped.
pub fn resolve_api_key(
    flag: Option<&str>,
    env: Option<&str>,
    preferences: &Preferences,
) -> Option<String> {
    [flag, env, preferences.remembered_api_key()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|key| !key.is_empty())
        .map(str::to_string)
}

/// What to search for in one mode.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub address: String,
    pub radius: f64,
    pub direction: Direction,
}

impl SearchParams {
    fn from_config(search: &SearchConfig) -> Self {
        Self {
            address: String::new(),
            radius: SearchConfig::normalize_radius(search.default_radius_miles),
            direction: search.default_direction.parse().unwrap_or_default(),
        }
    }
}

/// Everything needed to render one search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub mode: SearchMode,
    pub address: String,
    pub location: GeocodedLocation,
    pub radius: f64,
    pub direction: Direction,
    pub result: SearchResult,
    pub weather: Option<CurrentWeather>,
    pub last_update: Option<DateTime<Utc>>,
}

pub struct Session {
    config: Config,
    preferences: Preferences,
    preferences_path: PathBuf,
    geocoder: Geocoder,
    finder: StationFinder,
    weather: Option<WeatherProvider>,
    /// Geocode results keyed by `"{address}_{mode}"`
    locations: HashMap<String, GeocodedLocation>,
    pickup: SearchParams,
    dropoff: SearchParams,
}

impl Session {
    /// Build a session from config, reading preferences from the configured path.
    pub fn open(config: Config, api_key_flag: Option<&str>) -> Result<Self, AppError> {
        let path = config.storage.preferences_path.clone();
        let preferences = Preferences::load_from(&path);
        let env_key = std::env::var(API_KEY_ENV).ok();
        let api_key = resolve_api_key(api_key_flag, env_key.as_deref(), &preferences);
        Self::with_preferences(config, preferences, path, api_key)
    }

    pub fn with_preferences(
        config: Config,
        preferences: Preferences,
        preferences_path: PathBuf,
        api_key: Option<String>,
    ) -> Result<Self, AppError> {
        let http = &config.http;
        let endpoints = &config.endpoints;

        let geocoder = Geocoder::new(
            &endpoints.geocode_url,
            &http.user_agent,
            &config.search.locality,
            Duration::from_secs(http.geocode_timeout_secs),
        )?;
        let feed = GbfsClient::new(
            &endpoints.gbfs_url,
            Duration::from_secs(http.feed_timeout_secs),
            &http.user_agent,
        )?;
        let router = RoutingClient::new(
            &endpoints.routing_url,
            Duration::from_secs(http.routing_timeout_secs),
            &http.user_agent,
            config.search.barrier_ratio,
        )?;
        let weather = api_key.and_then(|key| {
            WeatherProvider::new(
                &endpoints.weather_url,
                &key,
                Duration::from_secs(http.weather_timeout_secs),
            )
        });

        let defaults = SearchParams::from_config(&config.search);
        Ok(Self {
            geocoder,
            finder: StationFinder::new(feed, router),
            weather,
            locations: HashMap::new(),
            pickup: defaults.clone(),
            dropoff: defaults,
            config,
            preferences,
            preferences_path,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn preferences_path(&self) -> &Path {
        &self.preferences_path
    }

    pub fn has_weather(&self) -> bool {
        self.weather.is_some()
    }

    pub fn finder(&self) -> &StationFinder {
        &self.finder
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.finder.last_update()
    }

    pub fn params(&self, mode: SearchMode) -> &SearchParams {
        match mode {
            SearchMode::Pickup => &self.pickup,
            SearchMode::Dropoff => &self.dropoff,
        }
    }

    fn params_mut(&mut self, mode: SearchMode) -> &mut SearchParams {
        match mode {
            SearchMode::Pickup => &mut self.pickup,
            SearchMode::Dropoff => &mut self.dropoff,
        }
    }

    pub fn set_address(&mut self, mode: SearchMode, address: &str) {
        self.params_mut(mode).address = address.trim().to_string();
    }

    /// Radii outside the offered choices fall back to 0.5 mi.
    pub fn set_radius(&mut self, mode: SearchMode, radius: f64) {
        self.params_mut(mode).radius = SearchConfig::normalize_radius(radius);
    }

    pub fn set_direction(&mut self, mode: SearchMode, direction: Direction) {
        self.params_mut(mode).direction = direction;
    }

    fn location_key(address: &str, mode: SearchMode) -> String {
        format!("{}_{}", address, mode)
    }

    /// The geocoded location for the current address in `mode`, if known.
    pub fn current_location(&self, mode: SearchMode) -> Option<&GeocodedLocation> {
        let address = &self.params(mode).address;
        self.locations.get(&Self::location_key(address, mode))
    }

    /// Resolve an address for a mode, consulting the session cache first.
    pub async fn locate(
        &mut self,
        mode: SearchMode,
        address: &str,
    ) -> Result<GeocodedLocation, AppError> {
        let key = Self::location_key(address, mode);
        if let Some(location) = self.locations.get(&key) {
            return Ok(location.clone());
        }

        let location = self.geocoder.geocode(address).await?;
        self.locations.insert(key, location.clone());
        Ok(location)
    }

    /// Point a mode at raw coordinates (a spot picked on the map).
    /// Returns the address label used for it.
    pub fn place_at(&mut self, mode: SearchMode, lat: f64, lon: f64) -> Result<String, AppError> {
        if !Coordinate::new(lat, lon).is_valid() {
            return Err(ConfigError::Invalid(format!("invalid coordinates: {}, {}", lat, lon)).into());
        }

        let label = format!("Map Location {:.4}, {:.4}", lat, lon);
        self.locations.insert(
            Self::location_key(&label, mode),
            GeocodedLocation::from_coordinates(lat, lon),
        );
        self.set_address(mode, &label);
        Ok(label)
    }

    /// Straight-line miles from the current location in `mode` to a point.
    pub fn distance_from_current(&self, mode: SearchMode, lat: f64, lon: f64) -> Option<f64> {
        self.current_location(mode)
            .map(|loc| haversine_miles(Coordinate::new(loc.lat, loc.lon), Coordinate::new(lat, lon)))
    }

    /// Refetch the station feed.
    pub async fn refresh_stations(&mut self) -> Result<usize, AppError> {
        let count = self.finder.refresh().await?;
        tracing::info!("Loaded {} stations", count);
        Ok(count)
    }

    /// Run the current search for `mode`.
    pub async fn search(
        &mut self,
        mode: SearchMode,
        force_refresh: bool,
    ) -> Result<SearchOutcome, AppError> {
        let params = self.params(mode).clone();
        if params.address.is_empty() {
            return Err(ConfigError::MissingSetting(format!("{} address", mode)).into());
        }

        let location = self.locate(mode, &params.address).await?;
        self.finder.ensure_loaded().await?;

        let mut query = SearchQuery::new(
            Coordinate::new(location.lat, location.lon),
            params.radius,
            params.direction,
        );
        query.force_refresh = force_refresh;
        let result = self.finder.find_nearby(&query).await;
        let weather = self.current_weather(&location).await;

        Ok(SearchOutcome {
            mode,
            address: params.address,
            location,
            radius: params.radius,
            direction: params.direction,
            result,
            weather,
            last_update: self.finder.last_update(),
        })
    }

    /// Weather at a location; failures are logged and never block a search.
    async fn current_weather(&self, location: &GeocodedLocation) -> Option<CurrentWeather> {
        let provider = self.weather.as_ref()?;
        match provider.current(location.lat, location.lon).await {
            Ok(weather) => Some(weather),
            Err(e) => {
                let error = weather_error(e);
                tracing::warn!("Weather unavailable: {}", error);
                None
            }
        }
    }

    fn save_preferences(&self) -> Result<(), AppError> {
        self.preferences.save_to(&self.preferences_path)?;
        Ok(())
    }

    /// Save the current search in `mode` as a favorite. The address must
    /// have been located already.
    pub fn save_favorite(&mut self, mode: SearchMode, name: Option<String>) -> Result<String, AppError> {
        let params = self.params(mode).clone();
        let location = self
            .current_location(mode)
            .cloned()
            .ok_or_else(|| ConfigError::MissingSetting(format!("a located {} address", mode)))?;

        let favorite = Favorite {
            address: params.address,
            search_type: mode,
            radius: params.radius,
            direction: params.direction.name().to_string(),
            location_result: location,
        };
        let name = self.preferences.add_favorite(name, favorite);
        self.save_preferences()?;
        tracing::info!("Saved favorite {:?}", name);
        Ok(name)
    }

    /// Restore a favorite's search, returning the mode it applies to.
    pub fn load_favorite(&mut self, name: &str) -> Result<SearchMode, AppError> {
        let favorite = self.preferences.favorite(name)?.clone();
        let mode = favorite.search_type;

        self.locations.insert(
            Self::location_key(&favorite.address, mode),
            favorite.location_result.clone(),
        );
        self.geocoder
            .remember(&favorite.address, favorite.location_result);

        let params = self.params_mut(mode);
        params.address = favorite.address;
        params.radius = SearchConfig::normalize_radius(favorite.radius);
        params.direction = favorite.direction.parse().unwrap_or_default();
        Ok(mode)
    }

    pub fn delete_favorite(&mut self, name: &str) -> Result<Favorite, AppError> {
        let removed = self.preferences.remove_favorite(name)?;
        self.save_preferences()?;
        Ok(removed)
    }

    /// Use a new weather API key, optionally remembering it on disk.
    pub fn set_api_key(&mut self, key: &str, remember: bool) -> Result<(), AppError> {
        self.preferences.set_api_key(key, remember);
        self.save_preferences()?;
        self.weather = WeatherProvider::new(
            &self.config.endpoints.weather_url,
            key,
            Duration::from_secs(self.config.http.weather_timeout_secs),
        );
        Ok(())
    }

    /// Drop the remembered key from disk and from this session.
    pub fn forget_api_key(&mut self) -> Result<(), AppError> {
        self.preferences.set_api_key("", false);
        self.save_preferences()?;
        self.weather = None;
        Ok(())
    }
}
