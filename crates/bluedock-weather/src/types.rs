use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weather condition groups mapped from OpenWeatherMap condition ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert an OpenWeatherMap condition id to a WeatherCondition
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_owm_id(id: u16) -> Self {
        match id {
            200..=299 => Self::Thunderstorm,
            300..=399 => Self::Drizzle,
            502..=504 | 522 | 531 => Self::HeavyRain,
            511 => Self::Sleet, // Freezing rain
            500..=599 => Self::Rain,
            611..=616 => Self::Sleet,
            600..=699 => Self::Snow,
            700..=799 => Self::Fog,
            801 | 802 => Self::PartlyCloudy,
            803 | 804 => Self::Cloudy,
            _ => Self::Clear,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
        }
    }

    /// Wet or icy conditions worth a warning next to the station list
    pub fn is_wet(&self) -> bool {
        matches!(
            self,
            Self::Drizzle | Self::Rain | Self::HeavyRain | Self::Snow | Self::Sleet | Self::Thunderstorm
        )
    }
}

/// How pleasant it is to ride right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RidingConditions {
    Perfect,
    Good,
    Ok,
}

impl RidingConditions {
    /// Rate temperature (°F) and wind speed (mph).
    pub fn assess(temperature_f: f64, wind_mph: f64) -> Self {
        if (65.0..=80.0).contains(&temperature_f) && wind_mph < 15.0 {
            Self::Perfect
        } else if (50.0..=85.0).contains(&temperature_f) && wind_mph < 20.0 {
            Self::Good
        } else {
            Self::Ok
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Perfect => "Perfect",
            Self::Good => "Good",
            Self::Ok => "OK",
        }
    }
}

/// Current weather at a location, imperial units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeather {
    /// °F
    pub temperature: f64,
    pub feels_like: f64,
    /// Percent
    pub humidity: u8,
    /// mph
    pub wind_speed: f64,
    /// Title-cased, e.g. "Light Rain"
    pub description: String,
    pub icon: String,
    pub condition: WeatherCondition,
    pub updated_at: DateTime<Utc>,
}

impl CurrentWeather {
    pub fn riding_conditions(&self) -> RidingConditions {
        RidingConditions::assess(self.temperature, self.wind_speed)
    }

    /// OpenWeatherMap icon image for the `icon` code
    pub fn icon_url(&self) -> String {
        format!("https://openweathermap.org/img/wn/{}@2x.png", self.icon)
    }
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid weather API key")]
    InvalidApiKey,
    #[error("Weather API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

/// "light rain" -> "Light Rain"
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owm_id_thunderstorm() {
        assert_eq!(WeatherCondition::from_owm_id(200), WeatherCondition::Thunderstorm);
        assert_eq!(WeatherCondition::from_owm_id(232), WeatherCondition::Thunderstorm);
    }

    #[test]
    fn test_owm_id_rain_groups() {
        assert_eq!(WeatherCondition::from_owm_id(300), WeatherCondition::Drizzle);
        assert_eq!(WeatherCondition::from_owm_id(500), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_owm_id(502), WeatherCondition::HeavyRain);
        assert_eq!(WeatherCondition::from_owm_id(511), WeatherCondition::Sleet);
    }

    #[test]
    fn test_owm_id_snow_and_fog() {
        assert_eq!(WeatherCondition::from_owm_id(601), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_owm_id(612), WeatherCondition::Sleet);
        assert_eq!(WeatherCondition::from_owm_id(741), WeatherCondition::Fog);
    }

    #[test]
    fn test_owm_id_clouds() {
        assert_eq!(WeatherCondition::from_owm_id(800), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_owm_id(801), WeatherCondition::PartlyCloudy);
        assert_eq!(WeatherCondition::from_owm_id(804), WeatherCondition::Cloudy);
        assert_eq!(WeatherCondition::from_owm_id(0), WeatherCondition::Clear);
    }

    #[test]
    fn test_riding_conditions_perfect() {
        assert_eq!(RidingConditions::assess(65.0, 0.0), RidingConditions::Perfect);
        assert_eq!(RidingConditions::assess(80.0, 14.9), RidingConditions::Perfect);
    }

    #[test]
    fn test_riding_conditions_good() {
        assert_eq!(RidingConditions::assess(72.0, 15.0), RidingConditions::Good);
        assert_eq!(RidingConditions::assess(50.0, 5.0), RidingConditions::Good);
        assert_eq!(RidingConditions::assess(85.0, 19.9), RidingConditions::Good);
    }

    #[test]
    fn test_riding_conditions_ok() {
        assert_eq!(RidingConditions::assess(49.9, 0.0), RidingConditions::Ok);
        assert_eq!(RidingConditions::assess(86.0, 0.0), RidingConditions::Ok);
        assert_eq!(RidingConditions::assess(70.0, 20.0), RidingConditions::Ok);
        assert_eq!(RidingConditions::Ok.label(), "OK");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("light rain"), "Light Rain");
        assert_eq!(title_case("overcast  clouds"), "Overcast Clouds");
        assert_eq!(title_case(""), "");
    }
}
