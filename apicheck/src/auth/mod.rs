//! Authentication helpers: mock tokens, Clerk webhook payloads, and the
//! auth endpoint paths.

mod token;
mod webhook;

pub use token::{
    DEFAULT_AUDIENCE, DEFAULT_EXPIRY, DEFAULT_ISSUED_AT, DEFAULT_ISSUER, DEFAULT_SUBJECT, MockToken,
};
pub use webhook::{TEST_SIGNATURE, generate_user_data, webhook_headers, webhook_payload};

use crate::assertions::assert_error_response;
use crate::client::{ApiClient, ApiResponse};
use crate::error::Result;

pub const SESSION_ENDPOINT: &str = "/api/v1/auth/session";
pub const REFRESH_ENDPOINT: &str = "/api/v1/auth/refresh";
pub const STATUS_ENDPOINT: &str = "/api/v1/auth/status";
pub const WEBHOOK_ENDPOINT: &str = "/api/v1/auth/clerk/webhook";

/// Issues the same request without and with authentication.
///
/// Fails unless the unauthenticated request is rejected with 401. Returns
/// `(unauthenticated, authenticated)` for further checks.
pub async fn check_auth_required(
    anonymous: &ApiClient,
    authenticated: &ApiClient,
    method: &str,
    path: &str,
) -> Result<(ApiResponse, ApiResponse)> {
    let without = anonymous.request(method, path)?.send().await;
    let with = authenticated.request(method, path)?.send().await;

    assert_error_response(&without, 401, None)?;
    Ok((without, with))
}
