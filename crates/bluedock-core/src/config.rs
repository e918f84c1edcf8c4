use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Radius options offered for a search, in miles.
pub const RADIUS_CHOICES: [f64; 7] = [0.1, 0.25, 0.5, 0.75, 1.0, 1.5, 2.0];

/// Direction filter names accepted in configuration.
pub const DIRECTION_CHOICES: [&str; 9] = [
    "all",
    "north",
    "northeast",
    "east",
    "southeast",
    "south",
    "southwest",
    "west",
    "northwest",
];

const APP_DIR: &str = "bluedock";
const CONFIG_FILE: &str = "config.toml";
const PREFERENCES_FILE: &str = ".bluebikes_config.json";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// External service endpoints
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Search defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// Local files
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// GBFS discovery document (gbfs.json)
    pub gbfs_url: String,

    /// OSRM route endpoint, walking profile
    pub routing_url: String,

    /// Nominatim search endpoint
    pub geocode_url: String,

    /// OpenWeatherMap API base
    pub weather_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            gbfs_url: "https://gbfs.bluebikes.com/gbfs/gbfs.json".to_string(),
            routing_url: "https://router.project-osrm.org/route/v1/walking".to_string(),
            geocode_url: "https://nominatim.openstreetmap.org/search".to_string(),
            weather_url: "https://api.openweathermap.org/data/2.5".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User agent sent to every service (Nominatim requires one)
    pub user_agent: String,

    pub feed_timeout_secs: u64,

    pub routing_timeout_secs: u64,

    pub geocode_timeout_secs: u64,

    pub weather_timeout_secs: u64,
}

fn default_feed_timeout() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("bluedock/", env!("CARGO_PKG_VERSION")).to_string(),
            feed_timeout_secs: default_feed_timeout(),
            routing_timeout_secs: default_request_timeout(),
            geocode_timeout_secs: default_request_timeout(),
            weather_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Radius used when none is given, in miles
    pub default_radius_miles: f64,

    /// Direction filter used when none is given
    pub default_direction: String,

    /// Appended to addresses that do not already name it, e.g. "Boston, MA"
    pub locality: String,

    /// Walking routes longer than this multiple of the straight line are rejected
    pub barrier_ratio: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_radius_miles: 0.5,
            default_direction: "all".to_string(),
            locality: "Boston, MA".to_string(),
            barrier_ratio: 3.0,
        }
    }
}

impl SearchConfig {
    /// Keep a radius that is one of the offered choices; anything else
    /// falls back to 0.5 mi.
    pub fn normalize_radius(radius: f64) -> f64 {
        RADIUS_CHOICES
            .iter()
            .copied()
            .find(|choice| (choice - radius).abs() < 1e-9)
            .unwrap_or(0.5)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Flat JSON preferences file (API key, favorites)
    pub preferences_path: PathBuf,

    /// Where rendered HTML maps are written when no path is given
    pub map_output: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            preferences_path: home.join(PREFERENCES_FILE),
            map_output: PathBuf::from("bluedock-map.html"),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file, creating it if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged. Returns an error if validation finds errors.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = Self::load_from(&Self::resolve_path(path)?)?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.endpoints.gbfs_url, "endpoints.gbfs_url", &mut result);
        self.validate_url(&self.endpoints.routing_url, "endpoints.routing_url", &mut result);
        self.validate_url(&self.endpoints.geocode_url, "endpoints.geocode_url", &mut result);
        self.validate_url(&self.endpoints.weather_url, "endpoints.weather_url", &mut result);

        let timeouts = [
            ("http.feed_timeout_secs", self.http.feed_timeout_secs),
            ("http.routing_timeout_secs", self.http.routing_timeout_secs),
            ("http.geocode_timeout_secs", self.http.geocode_timeout_secs),
            ("http.weather_timeout_secs", self.http.weather_timeout_secs),
        ];
        for (field, secs) in timeouts {
            if secs == 0 {
                result.add_error(field, "Timeout must be greater than 0");
            } else if secs > 120 {
                result.add_warning(field, "Timeout is unusually long (>120s)");
            }
        }

        if self.http.user_agent.trim().is_empty() {
            result.add_error("http.user_agent", "User agent must not be empty");
        }

        let radius = self.search.default_radius_miles;
        if !(radius > 0.0) {
            result.add_error("search.default_radius_miles", "Radius must be positive");
        } else if !RADIUS_CHOICES.iter().any(|c| (c - radius).abs() < 1e-9) {
            result.add_warning(
                "search.default_radius_miles",
                format!("{} mi is not a standard radius; 0.5 mi will be used", radius),
            );
        }

        let direction = self.search.default_direction.to_lowercase();
        if !DIRECTION_CHOICES.contains(&direction.as_str()) {
            result.add_error(
                "search.default_direction",
                format!("Unknown direction: {}", self.search.default_direction),
            );
        }

        if !(self.search.barrier_ratio >= 1.0) {
            result.add_error(
                "search.barrier_ratio",
                "Barrier ratio must be at least 1.0",
            );
        }

        if self.search.locality.trim().is_empty() {
            result.add_warning(
                "search.locality",
                "No locality set; addresses are geocoded as typed",
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// The file a load reads: the explicit path if given, else the default
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::config_path(),
        }
    }

    /// Path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join(APP_DIR);

        Ok(config_dir.join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.endpoints.routing_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "endpoints.routing_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.endpoints.gbfs_url = "ftp://gbfs.example.com/gbfs.json".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = Config::default();
        config.http.routing_timeout_secs = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "http.routing_timeout_secs"));
    }

    #[test]
    fn test_barrier_ratio_below_one_is_error() {
        let mut config = Config::default();
        config.search.barrier_ratio = 0.5;
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_unknown_direction_is_error() {
        let mut config = Config::default();
        config.search.default_direction = "up".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "search.default_direction"));
    }

    #[test]
    fn test_nonstandard_radius_is_warning() {
        let mut config = Config::default();
        config.search.default_radius_miles = 0.3;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "search.default_radius_miles"));
    }

    #[test]
    fn test_normalize_radius() {
        assert_eq!(SearchConfig::normalize_radius(1.5), 1.5);
        assert_eq!(SearchConfig::normalize_radius(0.1), 0.1);
        assert_eq!(SearchConfig::normalize_radius(0.3), 0.5);
        assert_eq!(SearchConfig::normalize_radius(-1.0), 0.5);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.search.barrier_ratio, 3.0);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.endpoints.gbfs_url, config.endpoints.gbfs_url);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[endpoints]\ngbfs_url = \"http://localhost:9000/gbfs.json\"\n\n\
             [http]\nfeed_timeout_secs = 20\n\n\
             [search]\nlocality = \"Cambridge, MA\"\n\n\
             [storage]\nmap_output = \"stations.html\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        let defaults = Config::default();
        assert_eq!(config.endpoints.gbfs_url, "http://localhost:9000/gbfs.json");
        assert_eq!(config.endpoints.routing_url, defaults.endpoints.routing_url);
        assert_eq!(config.http.feed_timeout_secs, 20);
        assert_eq!(config.http.user_agent, defaults.http.user_agent);
        assert_eq!(config.http.routing_timeout_secs, 10);
        assert_eq!(config.search.locality, "Cambridge, MA");
        assert_eq!(config.search.default_radius_miles, 0.5);
        assert_eq!(config.search.default_direction, "all");
        assert_eq!(config.search.barrier_ratio, 3.0);
        assert_eq!(config.storage.map_output, PathBuf::from("stations.html"));
        assert_eq!(config.storage.preferences_path, defaults.storage.preferences_path);
        assert!(config.validate().is_valid());
    }

    #[test]
    fn test_resolve_path_prefers_explicit_file() {
        let explicit = PathBuf::from("/tmp/bluedock-alt.toml");
        assert_eq!(Config::resolve_path(Some(&explicit)).unwrap(), explicit);
        if let Ok(default) = Config::config_path() {
            assert_eq!(Config::resolve_path(None).unwrap(), default);
        }
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
