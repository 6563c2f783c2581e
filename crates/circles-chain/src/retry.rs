//! Backoff for idempotent HTTP reads (whitelist fetches, confirmation polls).
//!
//! A read is retried on transport errors and on gateway statuses (502, 503,
//! 504). Any other response is returned to the caller as is. Transfer
//! submission never goes through here: a resent POST could move money twice.

use std::time::Duration;

use reqwest::StatusCode;

/// Retry attempts after the initial request.
const MAX_RETRIES: u32 = 3;

/// First backoff delay; doubles each attempt (200ms, 400ms, 800ms).
const BASE_DELAY_MS: u64 = 200;

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Issue `f` until it yields a non-transient outcome, at most `MAX_RETRIES + 1` times.
pub(crate) async fn retry_read<F, Fut>(endpoint: &str, f: F) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..MAX_RETRIES {
        let reason = match f().await {
            Ok(resp) if !is_transient(resp.status()) => return Ok(resp),
            Ok(resp) => format!("status {}", resp.status()),
            Err(e) => e.to_string(),
        };
        let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
        tracing::warn!(
            endpoint,
            attempt = attempt + 1,
            max_retries = MAX_RETRIES,
            "read failed ({reason}), retrying in {delay:?}"
        );
        tokio::time::sleep(delay).await;
    }
    f().await
}
