pub mod config;
pub mod error;
pub mod preferences;

pub use config::{
    Config, EndpointsConfig, HttpConfig, SearchConfig, StorageConfig, ValidationResult,
    DIRECTION_CHOICES, RADIUS_CHOICES,
};
pub use error::{
    AppError, ConfigError, FeedError, GeocodeError, NetworkError, RoutingError, StorageError,
    ReqwestErrorExt, WeatherError,
};
pub use preferences::{Favorite, GeocodedLocation, Preferences, SearchMode};

use anyhow::Result;

/// Initialize logging for the application.
///
/// `RUST_LOG` takes precedence; otherwise `default_level` is used.
pub fn init(default_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::debug!("Bluedock core initialized");
    Ok(())
}
