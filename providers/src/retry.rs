//! HTTP retry policy with exponential backoff.
//!
//! # Retry Policy
//!
//! - Max attempts: 3 (initial request + 2 retries)
//! - Initial delay: 500ms
//! - Max delay: 8 seconds for rate limits, 2 seconds for outages
//! - Jitter: down-jitter up to 25% (multiplier in [0.75, 1.0])
//!
//! # Retryable Conditions
//!
//! - HTTP 408, 409, 429, 5xx
//! - Connection and timeout errors
//! - `x-should-retry: true` forces retry
//! - `x-should-retry: false` forbids retry
//!
//! Rate limits (429) honor `Retry-After`/`Retry-After-Ms` and back off under
//! the full delay cap; connection failures and 5xx responses use the smaller
//! outage cap so a dead backend fails fast. Authentication failures and
//! malformed responses are classified by the caller and never reach this
//! module's retry loop.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, header::HeaderMap};
use uuid::Uuid;

/// Retry configuration shared by all backend clients.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the initial request.
    pub max_attempts: u32,
    /// Initial backoff delay before the first retry.
    pub initial_delay: Duration,
    /// Backoff cap for rate-limited requests.
    pub max_delay: Duration,
    /// Smaller backoff cap for unavailable backends.
    pub unavailable_max_delay: Duration,
    /// Jitter factor for down-jitter (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            unavailable_max_delay: Duration::from_secs(2),
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    /// Millisecond-scale delays for tests.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            unavailable_max_delay: Duration::from_millis(5),
            jitter_factor: 0.0,
        }
    }

    /// A single attempt, no retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::fast()
        }
    }
}

/// Parse `Retry-After` or `Retry-After-Ms` headers.
///
/// Returns `Some(duration)` if a valid value is found and `0 < duration < 60s`.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    // Try Retry-After-Ms first (milliseconds, float)
    if let Some(val) = headers.get("retry-after-ms")
        && let Ok(s) = val.to_str()
        && let Ok(ms) = s.parse::<f64>()
    {
        let duration = Duration::from_secs_f64(ms / 1000.0);
        if duration > Duration::ZERO && duration < Duration::from_secs(60) {
            return Some(duration);
        }
    }

    // Try Retry-After (seconds, integer)
    if let Some(val) = headers.get("retry-after")
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.parse::<u64>()
    {
        let duration = Duration::from_secs(secs);
        if duration > Duration::ZERO && duration < Duration::from_secs(60) {
            return Some(duration);
        }
    }

    None
}

/// Determine if a response status is retryable.
///
/// Respects `x-should-retry` header override if present.
#[must_use]
pub fn should_retry(status: StatusCode, headers: &HeaderMap) -> bool {
    if let Some(val) = headers.get("x-should-retry")
        && let Ok(s) = val.to_str()
    {
        if s.eq_ignore_ascii_case("true") {
            return true;
        }
        if s.eq_ignore_ascii_case("false") {
            return false;
        }
    }

    matches!(
        status.as_u16(),
        408 | 409 | 429 | 500 | 502 | 503 | 504 | 520..=599
    )
}

/// Calculate retry delay with exponential backoff and jitter.
///
/// - `backoff_step`: 0 before first retry, 1 before second, etc.
/// - A 429 respects `Retry-After` headers and uses the full delay cap; any
///   other retryable failure uses the smaller outage cap.
#[must_use]
pub fn calculate_retry_delay(
    backoff_step: u32,
    config: &RetryConfig,
    status: Option<StatusCode>,
    headers: Option<&HeaderMap>,
) -> Duration {
    let rate_limited = status.is_some_and(|s| s == StatusCode::TOO_MANY_REQUESTS);

    if rate_limited
        && let Some(headers) = headers
        && let Some(delay) = parse_retry_after(headers)
    {
        return delay;
    }

    let cap = if rate_limited {
        config.max_delay
    } else {
        config.unavailable_max_delay
    };

    // Exponential backoff: initial_delay * 2^backoff_step
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step as i32);
    let capped = base.min(cap.as_secs_f64());

    // Down-jitter: multiply by random factor in [1 - jitter_factor, 1.0]
    let jitter = 1.0 - rand::random::<f64>() * config.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}

fn add_retry_headers(builder: RequestBuilder, retry_count: u32, idempotency_key: &str) -> RequestBuilder {
    builder
        .header("X-Retry-Count", retry_count.to_string())
        .header("Idempotency-Key", idempotency_key)
}

#[must_use]
fn generate_idempotency_key() -> String {
    format!("quill-retry-{}", Uuid::new_v4())
}

/// Outcome of a retry operation.
///
/// A sum type that structurally distinguishes success from failure, so callers
/// cannot accidentally treat an error response as success.
#[derive(Debug)]
pub enum RetryOutcome {
    /// Request succeeded (2xx status).
    Success(Response),
    /// Request failed with an HTTP error after exhausting retries.
    /// The response is provided for error body inspection.
    HttpError(Response),
    /// Request failed with a connection/transport error after exhausting retries.
    ConnectionError {
        attempts: u32,
        source: reqwest::Error,
    },
    /// Request failed with a non-retryable connection error on first attempt.
    NonRetryable(reqwest::Error),
}

impl RetryOutcome {
    /// Returns true if this is a successful response.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Send a request with automatic retries.
///
/// `build_request` is called once per attempt; the same `Idempotency-Key` is
/// sent across all attempts. Only retryable statuses (see [`should_retry`])
/// and transport errors retry; everything else is returned to the caller for
/// classification.
pub async fn send_with_retry<F>(build_request: F, config: &RetryConfig) -> RetryOutcome
where
    F: Fn() -> RequestBuilder,
{
    let idempotency_key = generate_idempotency_key();
    let last_attempt = config.max_attempts.saturating_sub(1);

    for retry_count in 0..=last_attempt {
        let request = add_retry_headers(build_request(), retry_count, &idempotency_key);

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return RetryOutcome::Success(response);
                }

                if retry_count < last_attempt && should_retry(status, response.headers()) {
                    let delay = calculate_retry_delay(
                        retry_count,
                        config,
                        Some(status),
                        Some(response.headers()),
                    );
                    tracing::debug!(
                        status = %status,
                        retry_count = retry_count + 1,
                        delay_ms = delay.as_millis(),
                        "retrying request after error status"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }

                return RetryOutcome::HttpError(response);
            }
            Err(e) => {
                if retry_count < last_attempt && is_retryable_error(&e) {
                    let delay = calculate_retry_delay(retry_count, config, None, None);
                    tracing::debug!(
                        error = %e,
                        retry_count = retry_count + 1,
                        delay_ms = delay.as_millis(),
                        "retrying request after connection error"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }

                if retry_count == 0 && !is_retryable_error(&e) {
                    return RetryOutcome::NonRetryable(e);
                }
                return RetryOutcome::ConnectionError {
                    attempts: retry_count + 1,
                    source: e,
                };
            }
        }
    }

    unreachable!("retry loop always returns from its final attempt")
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}


#[cfg(test)]
mod integration_tests {
    use super::{RetryConfig, RetryOutcome, send_with_retry};
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn success_on_first_attempt() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/test", server.uri());

        let outcome = send_with_retry(|| client.get(&url), &RetryConfig::fast()).await;

        match outcome {
            RetryOutcome::Success(response) => {
                assert_eq!(response.status(), StatusCode::OK);
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retries_on_429_then_succeeds() {
        let server = MockServer::start().await;
        let attempt = AtomicU32::new(0);

        Mock::given(method("GET"))
            .and(path("/test"))
            .respond_with(move |_: &wiremock::Request| {
                if attempt.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(429)
                } else {
                    ResponseTemplate::new(200).set_body_string("ok")
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/test", server.uri());

        let outcome = send_with_retry(|| client.get(&url), &RetryConfig::fast()).await;
        assert!(outcome.is_success(), "expected Success, got {outcome:?}");
    }

    #[tokio::test]
    async fn exhausts_retries_and_returns_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3) // initial + 2 retries
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/test", server.uri());

        let outcome = send_with_retry(|| client.get(&url), &RetryConfig::fast()).await;

        match outcome {
            RetryOutcome::HttpError(response) => {
                assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
            }
            other => panic!("expected HttpError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_status_fails_immediately() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/test"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/test", server.uri());

        let outcome = send_with_retry(|| client.get(&url), &RetryConfig::fast()).await;

        match outcome {
            RetryOutcome::HttpError(response) => {
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            }
            other => panic!("expected HttpError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn idempotency_key_consistent_across_retries() {
        let server = MockServer::start().await;
        let keys: std::sync::Arc<std::sync::Mutex<Vec<String>>> =
            std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let keys_clone = keys.clone();

        Mock::given(method("GET"))
            .and(path("/test"))
            .respond_with(move |req: &wiremock::Request| {
                let key = req
                    .headers
                    .get("Idempotency-Key")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                keys_clone.lock().unwrap().push(key);

                if keys_clone.lock().unwrap().len() < 3 {
                    ResponseTemplate::new(500)
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/test", server.uri());

        let _ = send_with_retry(|| client.get(&url), &RetryConfig::fast()).await;

        let collected = keys.lock().unwrap();
        assert_eq!(collected.len(), 3);
        assert!(collected[0].starts_with("quill-retry-"));
        assert_eq!(collected[0], collected[1]);
        assert_eq!(collected[1], collected[2]);
    }
}
