//! Rate-limit bursts.
//!
//! [`burst`] only collects responses; [`assert_rate_limited`] decides. The
//! assertion expects the limiter to engage exactly at the limit.

use std::future::Future;
use std::time::Duration;

use crate::assertions::assert_error_response;
use crate::client::ApiResponse;
use crate::error::{Error, Result};

/// Delay between burst requests.
pub const BURST_INTERVAL: Duration = Duration::from_millis(100);

/// Error code expected on throttled responses.
pub const RATE_LIMIT_CODE: &str = "RATE_LIMIT_EXCEEDED";

/// Issues `limit + 2` sequential requests and returns them in call order.
///
/// `request` is called once per attempt and must build a fresh request.
pub async fn burst<F, Fut>(limit: usize, mut request: F) -> Vec<ApiResponse>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResponse>,
{
    let total = limit + 2;
    let mut responses = Vec::with_capacity(total);
    for i in 0..total {
        let response = request().await;
        tracing::debug!(
            attempt = i + 1,
            status = response.status_code(),
            "rate limit burst"
        );
        responses.push(response);
        tokio::time::sleep(BURST_INTERVAL).await;
    }
    responses
}

/// Asserts responses `[0, limit)` are not 429 and `[limit, len)` are 429
/// with [`RATE_LIMIT_CODE`].
pub fn assert_rate_limited(responses: &[ApiResponse], limit: usize) -> Result<()> {
    for (i, response) in responses.iter().enumerate().take(limit) {
        if response.status_code() == 429 {
            return Err(Error::assertion(format!(
                "Request {} was rate limited unexpectedly",
                i + 1
            )));
        }
    }

    for (i, response) in responses.iter().enumerate().skip(limit) {
        assert_error_response(response, 429, Some(RATE_LIMIT_CODE)).map_err(|e| {
            Error::assertion(format!("Request {}: {}", i + 1, e.message))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok() -> ApiResponse {
        ApiResponse::json(202, json!({"batch_id": "b"}))
    }

    fn limited() -> ApiResponse {
        ApiResponse::json(429, json!({"error": "Too many requests", "code": "RATE_LIMIT_EXCEEDED"}))
    }

    #[test]
    fn test_exact_boundary_passes() {
        let mut responses: Vec<_> = (0..10).map(|_| ok()).collect();
        responses.push(limited());
        responses.push(limited());
        assert!(assert_rate_limited(&responses, 10).is_ok());
    }

    #[test]
    fn test_early_limit_fails() {
        let mut responses: Vec<_> = (0..9).map(|_| ok()).collect();
        responses.extend((0..3).map(|_| limited()));
        let err = assert_rate_limited(&responses, 10).unwrap_err();
        assert!(err.message.contains("Request 10 was rate limited"));
    }

    #[test]
    fn test_missing_limit_fails() {
        let mut responses: Vec<_> = (0..11).map(|_| ok()).collect();
        responses.push(limited());
        let err = assert_rate_limited(&responses, 10).unwrap_err();
        assert!(err.message.starts_with("Request 11"));
    }

    #[test]
    fn test_wrong_code_fails() {
        let mut responses: Vec<_> = (0..2).map(|_| ok()).collect();
        responses.push(ApiResponse::json(429, json!({"error": "slow", "code": "THROTTLED"})));
        assert!(assert_rate_limited(&responses, 2).is_err());
    }

    #[test]
    fn test_short_list() {
        let responses: Vec<_> = (0..3).map(|_| ok()).collect();
        assert!(assert_rate_limited(&responses, 10).is_ok());
    }

    #[tokio::test]
    async fn test_burst_issues_limit_plus_two() {
        let mut calls = 0;
        let responses = burst(3, || {
            calls += 1;
            let n = calls;
            async move {
                if n > 3 { limited() } else { ok() }
            }
        })
        .await;

        assert_eq!(responses.len(), 5);
        assert!(assert_rate_limited(&responses, 3).is_ok());
    }
}
