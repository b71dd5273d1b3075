//! HTTP retry helpers for transient provider errors.
//!
//! Provider clients call [`send_json`] instead of
//! `reqwest::RequestBuilder::send()` directly so that every request gets
//! bounded retry with exponential backoff for transient failures
//! (timeouts, connection resets, HTTP 429, HTTP 5xx).
//!
//! ```ignore
//! let body = retry::send_json(&policy, || client.get(&url).query(&params)).await?;
//! ```

use std::time::Duration;

use crate::{TransportError, redact_url};

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// A policy with `max_retries` and a one-second base delay.
    #[must_use]
    pub const fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_max_retries(2)
    }
}

/// Sends a request and parses the response body as JSON.
///
/// `build_request` is called once per attempt since builders are
/// consumed by `.send()`.
///
/// Does **not** retry HTTP 4xx (except 429); those are permanent.
///
/// # Errors
///
/// Returns [`TransportError`] if the request still fails after all
/// retries, the server returns a permanent error status, or the body is
/// not valid JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    policy: &RetryPolicy,
    build_request: F,
) -> Result<serde_json::Value, TransportError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(policy, &build_request).await?;
    let url = redact_url(response.url());
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::error!(
            "JSON parse failed.\n  \
             url: {url}\n  \
             received: {} bytes\n  \
             parse error: {e}\n  \
             body preview: {preview}",
            text.len()
        );
        TransportError::Json {
            message: format!("{e} (received {} bytes from {url})", text.len()),
        }
    })
}

/// Core retry loop. Returns the first successful (2xx/3xx) response.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    policy: &RetryPolicy,
    build_request: &F,
) -> Result<reqwest::Response, TransportError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            log::warn!("  retry {attempt}/{} in {delay:?}...", policy.max_retries);
            tokio::time::sleep(delay).await;
        }

        let can_retry = attempt < policy.max_retries;
        attempt += 1;

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && can_retry {
                    log::warn!("  transient error: {e}");
                    continue;
                }
                return Err(TransportError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if is_retryable_status(status) && can_retry {
                    log::warn!("  HTTP {status} from {}", redact_url(response.url()));
                    continue;
                }

                if status.is_client_error() || status.is_server_error() {
                    return Err(TransportError::Status {
                        status: status.as_u16(),
                        url: redact_url(response.url()),
                    });
                }

                return Ok(response);
            }
        }
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

/// 429 and 5xx are retried; other statuses are final.
fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Accepts connections and holds them open without ever replying.
    /// Returns the base URL and a count of accepted connections.
    async fn silent_server() -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(stream);
            }
        });
        (url, accepted)
    }

    #[test]
    fn delays_double() {
        let policy = RetryPolicy::with_max_retries(3);
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
    }

    #[test]
    fn only_rate_limit_and_server_errors_retry() {
        assert!(is_retryable_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(reqwest::StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(reqwest::StatusCode::UNPROCESSABLE_ENTITY));
    }

    #[tokio::test]
    async fn timeout_is_retried_then_surfaces_as_http_error() {
        let (url, accepted) = silent_server().await;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(10),
        };

        let err = send_json(&policy, || client.get(&url)).await.unwrap_err();

        assert!(matches!(&err, TransportError::Http(e) if e.is_timeout()));
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }
}
