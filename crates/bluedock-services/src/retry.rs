//! Retry utilities for HTTP calls to the public services.
//!
//! Two policies exist:
//! - `RetryOn::Timeouts` only repeats requests that timed out (geocoder).
//! - `RetryOn::Transient` also repeats connection failures, 5xx, 408 and 429
//!   responses (station feed).
//!
//! 4xx client errors are never retried.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};

/// Which failures a retry loop should repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOn {
    Timeouts,
    Transient,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry (doubles each attempt)
    pub initial_delay: Duration,
    /// Cap on the delay between retries
    pub max_delay: Duration,
    pub retry_on: RetryOn,
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64, retry_on: RetryOn) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            retry_on,
        }
    }

    /// Two attempts per query, one second apart, only on timeouts.
    pub fn geocoder() -> Self {
        Self::new(1, 1000, 1000, RetryOn::Timeouts)
    }

    /// One retry for transient feed failures.
    pub fn feed() -> Self {
        Self::new(1, 500, 2000, RetryOn::Transient)
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, 0, 0, RetryOn::Timeouts)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as u64))
    }

    pub fn should_retry_error(&self, error: &reqwest::Error) -> bool {
        if error.is_timeout() {
            tracing::debug!("Request timed out, will retry");
            return true;
        }

        match self.retry_on {
            RetryOn::Timeouts => false,
            RetryOn::Transient => {
                if error.is_connect() {
                    tracing::debug!("Connection error, will retry");
                    return true;
                }
                error.status().is_some_and(is_transient_status)
            }
        }
    }

    pub fn should_retry_status(&self, status: StatusCode) -> bool {
        self.retry_on == RetryOn::Transient && is_transient_status(status)
    }
}

/// 5xx, 408 and 429 are worth repeating; everything else is final.
pub fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Execute an HTTP request with retry logic.
///
/// Returns the first non-retryable response, or the last outcome once
/// retries are exhausted.
pub async fn with_retry<F, Fut>(config: &RetryConfig, operation: F) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 0;

    loop {
        let outcome = operation().await;
        let exhausted = attempt >= config.max_retries;

        match outcome {
            Ok(response) => {
                let status = response.status();
                if exhausted || !config.should_retry_status(status) {
                    if attempt > 0 {
                        tracing::info!("Request finished with {} after {} retries", status, attempt);
                    }
                    return Ok(response);
                }
                tracing::warn!(
                    "Request returned retryable status {}, attempt {} of {}",
                    status,
                    attempt + 1,
                    config.max_retries + 1
                );
            }
            Err(e) => {
                if exhausted || !config.should_retry_error(&e) {
                    return Err(e);
                }
                tracing::warn!(
                    "Retryable error on attempt {} of {}: {}",
                    attempt + 1,
                    config.max_retries + 1,
                    e
                );
            }
        }

        let delay = config.delay_for_attempt(attempt);
        attempt += 1;
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_geocoder_policy() {
        let config = RetryConfig::geocoder();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.retry_on, RetryOn::Timeouts);
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig::new(3, 100, 5000, RetryOn::Transient);
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig::new(10, 100, 1000, RetryOn::Transient);
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_status_policy() {
        let transient = RetryConfig::feed();
        assert!(transient.should_retry_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(transient.should_retry_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!transient.should_retry_status(StatusCode::NOT_FOUND));
        assert!(!transient.should_retry_status(StatusCode::OK));

        let timeouts_only = RetryConfig::geocoder();
        assert!(!timeouts_only.should_retry_status(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_retries_server_error_then_succeeds() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/feed", mock_server.uri());
        let config = RetryConfig::new(2, 1, 5, RetryOn::Transient);

        let response = with_retry(&config, || client.get(&url).send()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/feed", mock_server.uri());
        let config = RetryConfig::new(3, 1, 5, RetryOn::Transient);

        let response = with_retry(&config, || client.get(&url).send()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/feed", mock_server.uri());
        let config = RetryConfig::new(1, 1, 5, RetryOn::Transient);

        let response = with_retry(&config, || client.get(&url).send()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
