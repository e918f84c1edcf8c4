//! Current weather for Bluedock
//!
//! Fetches conditions at the search location from OpenWeatherMap and
//! rates them for riding.

pub mod provider;
pub mod types;

pub use provider::{WeatherProvider, PLACEHOLDER_API_KEY};
pub use types::*;
