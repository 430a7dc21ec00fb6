use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;

const MAX_BACKOFF_MS: u64 = 30_000;
const ERROR_BODY_MAX_CHARS: usize = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Public struct `RetryPolicy` shared by the tracker and chat API clients.
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: base_delay_ms.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 500)
    }
}

/// Reads a `Retry-After` header given in whole seconds. HTTP-date values are ignored.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Delay before retry number `attempt` (1-based). A server hint wins over the
/// exponential schedule but never drops below `base_delay_ms`. Both are capped.
pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    let millis = match retry_after {
        Some(hint) => u64::try_from(hint.as_millis())
            .unwrap_or(u64::MAX)
            .max(base_delay_ms),
        None => {
            let doublings = attempt.saturating_sub(1).min(16) as u32;
            base_delay_ms.saturating_mul(1_u64 << doublings)
        }
    };
    Duration::from_millis(millis.min(MAX_BACKOFF_MS))
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Keeps the first `max_chars` characters and marks the cut with `...`.
pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Whether a request may be sent again after the server could already have acted on it.
enum ReplaySafety {
    /// Reads, PATCH with absolute values and DELETE.
    Idempotent,
    /// Creates. Only throttling and failed connections are retried.
    NotIdempotent,
}

impl ReplaySafety {
    fn retries_status(self, status: u16) -> bool {
        match self {
            Self::Idempotent => is_retryable_status(status),
            Self::NotIdempotent => status == 429,
        }
    }

    fn retries_transport_error(self, error: &reqwest::Error) -> bool {
        match self {
            Self::Idempotent => is_retryable_transport_error(error),
            Self::NotIdempotent => error.is_connect(),
        }
    }
}

/// Sends a request, retrying throttled, failing-server and transport errors.
///
/// Returns the last response whatever its status, so callers can treat
/// statuses such as 404 as data. Only transport failures are errors here.
pub async fn send_with_retry<F>(
    service: &str,
    operation: &str,
    policy: RetryPolicy,
    request_builder: F,
) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    send_with_replay_safety(
        service,
        operation,
        policy,
        ReplaySafety::Idempotent,
        request_builder,
    )
    .await
}

/// Like [`send_with_retry`] for requests that must not reach the server twice:
/// a 5xx or a timeout may mean the server already applied the request.
pub async fn send_non_idempotent<F>(
    service: &str,
    operation: &str,
    policy: RetryPolicy,
    request_builder: F,
) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    send_with_replay_safety(
        service,
        operation,
        policy,
        ReplaySafety::NotIdempotent,
        request_builder,
    )
    .await
}

async fn send_with_replay_safety<F>(
    service: &str,
    operation: &str,
    policy: RetryPolicy,
    safety: ReplaySafety,
    mut request_builder: F,
) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut attempt = 0_usize;
    loop {
        attempt = attempt.saturating_add(1);
        match request_builder().send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if response.status().is_success()
                    || attempt >= policy.max_attempts
                    || !safety.retries_status(status)
                {
                    return Ok(response);
                }
                let delay = retry_delay(
                    policy.base_delay_ms,
                    attempt,
                    parse_retry_after(response.headers()),
                );
                tracing::debug!(
                    service,
                    operation,
                    status,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying request after retryable status"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                if attempt < policy.max_attempts && safety.retries_transport_error(&error) {
                    let delay = retry_delay(policy.base_delay_ms, attempt, None);
                    tracing::debug!(
                        service,
                        operation,
                        attempt,
                        error = %error,
                        "retrying request after transport error"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(error)
                    .with_context(|| format!("{service} api {operation} request failed"));
            }
        }
    }
}

/// Fails with the status and a truncated body unless the response succeeded.
pub async fn ensure_success(
    service: &str,
    operation: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!(
        "{service} api {operation} failed with status {}: {}",
        status.as_u16(),
        truncate_for_error(&body, ERROR_BODY_MAX_CHARS)
    );
}

pub async fn decode_json_response<T>(
    service: &str,
    operation: &str,
    response: reqwest::Response,
) -> Result<T>
where
    T: DeserializeOwned,
{
    let response = ensure_success(service, operation, response).await?;
    response
        .json::<T>()
        .await
        .with_context(|| format!("failed to decode {service} {operation}"))
}
