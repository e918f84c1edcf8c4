use bluedock_core::{AppError, NetworkError, WeatherError};
use bluedock_weather::WeatherError as ProviderError;

/// Convert a weather provider failure into the shared error hierarchy.
pub fn weather_error(e: ProviderError) -> AppError {
    match e {
        ProviderError::InvalidApiKey => AppError::Weather(WeatherError::InvalidApiKey),
        ProviderError::Network(err) if err.is_timeout() => AppError::Network(NetworkError::Timeout),
        ProviderError::Network(err) => {
            AppError::Network(NetworkError::ConnectionFailed(err.to_string()))
        }
        ProviderError::Api { status, .. } if status >= 500 => {
            AppError::Weather(WeatherError::ServiceUnavailable)
        }
        ProviderError::Api { status, message } => {
            AppError::Weather(WeatherError::ApiError(format!("{}: {}", status, message)))
        }
        ProviderError::Parse(s) => AppError::Weather(WeatherError::ApiError(s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_key_maps_to_weather_error() {
        let app = weather_error(ProviderError::InvalidApiKey);
        assert!(matches!(app, AppError::Weather(WeatherError::InvalidApiKey)));
        assert!(app.user_message().contains("API key"));
    }

    #[test]
    fn server_errors_map_to_unavailable() {
        let app = weather_error(ProviderError::Api {
            status: 503,
            message: "down".into(),
        });
        assert!(matches!(app, AppError::Weather(WeatherError::ServiceUnavailable)));
    }

    #[test]
    fn parse_errors_keep_detail() {
        let app = weather_error(ProviderError::Parse("missing main".into()));
        assert!(app.to_string().contains("missing main"));
    }
}
