//! HTTP retry for transient errors.
//!
//! Source downloads go through [`send_text`] rather than calling
//! `reqwest::RequestBuilder::send()` directly, so timeouts, connection
//! resets, rate limiting and server errors are retried with exponential
//! backoff.

use std::time::Duration;

use crate::SourceError;

/// Retries after the first attempt. Backoff is 1s, 2s, 4s.
const MAX_RETRIES: u32 = 3;

/// Sends a request and returns the response body as text.
///
/// `build_request` is called once per attempt since builders are consumed
/// by `send()`. HTTP 4xx other than 429 is permanent and not retried.
///
/// # Errors
///
/// Returns [`SourceError`] if the request still fails after all retries or
/// the server answers with a non-retryable status.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(build_request: F) -> Result<String, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, MAX_RETRIES).await?;
    Ok(response.text().await?)
}

#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    max_retries: u32,
) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = backoff(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }
        let can_retry = attempt < max_retries;
        attempt += 1;

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) if is_transient(&e) && can_retry => {
                log::warn!("  transient error: {e}");
                continue;
            }
            Err(e) => return Err(SourceError::Http(e)),
        };

        let status = response.status();
        if is_retryable_status(status) {
            if can_retry {
                log::warn!("  HTTP {status}");
                continue;
            }
            return Err(SourceError::Response {
                message: format!("HTTP {status} after {max_retries} retries"),
            });
        }
        if status.is_client_error() {
            return Err(SourceError::Response {
                message: format!("HTTP {status}"),
            });
        }

        return Ok(response);
    }
}

const fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << (attempt - 1))
}

fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}
