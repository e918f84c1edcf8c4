use crate::types::{title_case, CurrentWeather, WeatherCondition, WeatherError};
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Key shipped in sample configs; treated as "no key".
pub const PLACEHOLDER_API_KEY: &str = "your_openweathermap_api_key_here";

#[derive(Debug, Deserialize)]
struct OwmResponse {
    main: OwmMain,
    wind: Option<OwmWind>,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    #[serde(default)]
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    #[serde(default)]
    id: u16,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
}

impl WeatherProvider {
    /// Build a provider, or `None` when no usable API key is configured.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Option<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() || api_key == PLACEHOLDER_API_KEY {
            tracing::debug!("No weather API key configured");
            return None;
        }

        let client = match Client::builder().timeout(timeout).build() {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Failed to create weather client: {}", e);
                return None;
            }
        };

        Some(Self {
            client: Arc::new(client),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Current conditions at a point, in °F and mph.
    #[instrument(skip(self), level = "debug")]
    pub async fn current(&self, lat: f64, lon: f64) -> Result<CurrentWeather, WeatherError> {
        let url = format!("{}/weather", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "imperial".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(WeatherError::InvalidApiKey);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(WeatherError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: OwmResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::Parse(e.to_string()))?;

        let condition = body.weather.first();
        let weather = CurrentWeather {
            temperature: body.main.temp,
            feels_like: body.main.feels_like,
            humidity: body.main.humidity.clamp(0.0, 100.0).round() as u8,
            wind_speed: body.wind.map(|w| w.speed).unwrap_or(0.0),
            description: condition.map(|c| title_case(&c.description)).unwrap_or_default(),
            icon: condition.map(|c| c.icon.clone()).unwrap_or_default(),
            condition: condition
                .map(|c| WeatherCondition::from_owm_id(c.id))
                .unwrap_or_default(),
            updated_at: Utc::now(),
        };

        tracing::debug!(
            "Weather: {:.0}°F, {} ({:.1} mph wind)",
            weather.temperature,
            weather.description,
            weather.wind_speed
        );
        Ok(weather)
    }
}
