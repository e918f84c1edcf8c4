//! Centralized error types for Bluedock.
//!
//! Every crate-level error maps into [`AppError`], which carries a short
//! user-facing message alongside the detailed error kept for logging.

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` for what the terminal shows; log the `Display` form.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Geocoding error: {0}")]
    Geocode(#[from] GeocodeError),

    #[error("Station feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for the terminal.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Storage(e) => e.user_message(),
            AppError::Geocode(e) => e.user_message(),
            AppError::Feed(e) => e.user_message(),
            AppError::Routing(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

/// Preferences file errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("Favorite not found: {0}")]
    FavoriteNotFound(String),
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::Read { .. } => "Saved preferences could not be read. Using defaults.",
            StorageError::Write { .. } => "Preferences could not be saved.",
            StorageError::FavoriteNotFound(_) => "No favorite with that name.",
        }
    }
}

/// Address lookup errors.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Could not find location for: {0}")]
    NotFound(String),

    #[error("Geocoder unavailable: {0}")]
    Unavailable(String),
}

impl GeocodeError {
    pub fn user_message(&self) -> &'static str {
        match self {
            GeocodeError::NotFound(_) => "Address not found. Try adding a street number or city.",
            GeocodeError::Unavailable(_) => "Address lookup is unavailable. Please try again.",
        }
    }
}

/// Station feed errors.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed missing from discovery document: {0}")]
    MissingFeed(String),

    #[error("Feed unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed feed: {0}")]
    Malformed(String),
}

impl FeedError {
    pub fn user_message(&self) -> &'static str {
        match self {
            FeedError::MissingFeed(_) | FeedError::Malformed(_) => {
                "Could not load bike station data. Please try refreshing."
            }
            FeedError::Unavailable(_) => "The bike station feed is unavailable. Please try refreshing.",
        }
    }
}

/// Walking route errors.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Routing service unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected routing response: {0}")]
    InvalidResponse(String),
}

impl RoutingError {
    pub fn user_message(&self) -> &'static str {
        match self {
            RoutingError::Unavailable(_) => "Walking routes are unavailable right now.",
            RoutingError::InvalidResponse(_) => "The routing service returned an unexpected answer.",
        }
    }
}

/// Weather service errors.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Weather API error: {0}")]
    ApiError(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::ApiError(_) => "Weather service error. Please try again.",
            WeatherError::InvalidApiKey => "Weather API key is invalid. Check settings.",
            WeatherError::ServiceUnavailable => {
                "Weather service unavailable. Please try again later."
            }
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
