//! Assertions over [`ApiResponse`] values.
//!
//! Every helper returns an [`ErrorKind::Assertion`](crate::error::ErrorKind::Assertion)
//! error whose message embeds the expected and actual values plus the full
//! response, so failures are diagnosable from the report alone.

use std::time::Duration;

use crate::client::{ApiResponse, Body};
use crate::error::{Error, Result};
use crate::openapi::ResponseValidator;

/// Default response-time threshold.
pub const DEFAULT_MAX_RESPONSE_TIME: Duration = Duration::from_secs(2);

/// Asserts the response took less than [`DEFAULT_MAX_RESPONSE_TIME`].
pub fn assert_response_time(response: &ApiResponse) -> Result<()> {
    assert_response_time_within(response, DEFAULT_MAX_RESPONSE_TIME)
}

/// Asserts the response took less than `max`.
pub fn assert_response_time_within(response: &ApiResponse, max: Duration) -> Result<()> {
    if response.duration() < max {
        return Ok(());
    }
    Err(Error::assertion(format!(
        "Response took {:.2}s (exceeds {:.2}s threshold)",
        response.duration_secs(),
        max.as_secs_f64()
    )))
}

/// Asserts status 200 with a body free of an `error` field.
pub fn assert_ok(response: &ApiResponse) -> Result<()> {
    assert_success_response(response, 200)
}

/// Asserts `expected` status with a body free of an `error` field.
pub fn assert_success_response(response: &ApiResponse, expected: u16) -> Result<()> {
    if response.status_code() != expected {
        return Err(Error::assertion(format!(
            "Expected status {}, got {}. Error: {:?}, Data: {:?}",
            expected,
            response.status_code(),
            response.error(),
            response.data()
        )));
    }
    if response.data().is_none() {
        return Err(Error::assertion(format!(
            "Response data should not be empty: {:?}",
            response
        )));
    }
    if response.has_error_field() {
        return Err(Error::assertion(format!(
            "Success response should not contain an error: {:?}",
            response.data()
        )));
    }
    Ok(())
}

/// Asserts an `expected` error status.
///
/// When the response has a body it must carry an `error` field, and if
/// `code` is given the body's `code` must equal it exactly.
pub fn assert_error_response(
    response: &ApiResponse,
    expected: u16,
    code: Option<&str>,
) -> Result<()> {
    if response.status_code() != expected {
        return Err(Error::assertion(format!(
            "Expected status {}, got {}. Error: {:?}, Data: {:?}",
            expected,
            response.status_code(),
            response.error(),
            response.data()
        )));
    }

    let Some(body) = response.data().filter(|b| has_content(b)) else {
        return Ok(());
    };

    if body.get("error").is_none() {
        return Err(Error::assertion(format!(
            "Error response should contain 'error' field: {:?}",
            body
        )));
    }

    if let Some(expected_code) = code {
        let actual = body.get("code").and_then(|v| v.as_str());
        if actual != Some(expected_code) {
            return Err(Error::assertion(format!(
                "Expected error code {}, got {:?}. Data: {:?}",
                expected_code, actual, body
            )));
        }
    }
    Ok(())
}

/// Asserts the validator does not report the response as non-compliant.
pub fn assert_contract_compliance(
    validator: &dyn ResponseValidator,
    response: &ApiResponse,
    method: &str,
    path: &str,
) -> Result<()> {
    let compliance = validator.validate(method, path, response.status_code(), response.data());
    if compliance.is_acceptable() {
        return Ok(());
    }
    Err(Error::assertion(format!(
        "Response does not comply with API contract. Method: {}, Endpoint: {}, Status: {}, Data: {:?}",
        method,
        path,
        response.status_code(),
        response.data()
    )))
}

/// Asserts the status is one of `allowed`.
pub fn assert_status_in(response: &ApiResponse, allowed: &[u16]) -> Result<()> {
    if allowed.contains(&response.status_code()) {
        return Ok(());
    }
    Err(Error::assertion(format!(
        "Expected status in {:?}, got {}. Error: {:?}, Data: {:?}",
        allowed,
        response.status_code(),
        response.error(),
        response.data()
    )))
}

fn has_content(body: &Body) -> bool {
    match body {
        Body::Json(value) => match value {
            serde_json::Value::Null => false,
            serde_json::Value::Object(map) => !map.is_empty(),
            serde_json::Value::Array(items) => !items.is_empty(),
            serde_json::Value::String(s) => !s.is_empty(),
            _ => true,
        },
        Body::Raw(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::openapi::{ContractDocument, ContractValidator};
    use serde_json::json;

    fn timed(status: u16, millis: u64) -> ApiResponse {
        ApiResponse::new(
            status,
            Body::Json(json!({"status": "ok"})),
            Vec::<(String, String)>::new(),
            Duration::from_millis(millis),
        )
    }

    #[test]
    fn test_response_time_default_threshold() {
        assert!(assert_response_time(&timed(200, 1500)).is_ok());
        let err = assert_response_time(&timed(200, 2500)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Assertion);
        assert!(err.message.contains("2.50s"));
    }

    #[test]
    fn test_response_time_override() {
        assert!(assert_response_time_within(&timed(200, 300), Duration::from_millis(500)).is_ok());
        assert!(assert_response_time_within(&timed(200, 600), Duration::from_millis(500)).is_err());
    }

    #[test]
    fn test_success_response() {
        assert!(assert_ok(&ApiResponse::json(200, json!({"ok": true}))).is_ok());
        assert!(assert_success_response(&ApiResponse::json(202, json!({"batch_id": "b"})), 202).is_ok());
        assert!(assert_ok(&ApiResponse::json(200, json!({"error": null}))).is_ok());
    }

    #[test]
    fn test_success_rejects_wrong_status() {
        let err = assert_ok(&ApiResponse::json(404, json!({"error": "nope"}))).unwrap_err();
        assert!(err.message.contains("Expected status 200, got 404"));
    }

    #[test]
    fn test_success_rejects_error_field() {
        assert!(assert_ok(&ApiResponse::json(200, json!({"error": "boom"}))).is_err());
    }

    #[test]
    fn test_success_rejects_sentinel() {
        let resp = ApiResponse::connection_failed(Duration::ZERO);
        assert!(assert_success_response(&resp, 503).is_err());
    }

    #[test]
    fn test_error_response_code_exact() {
        let resp = ApiResponse::json(400, json!({"error": "bad", "code": "INVALID_FILE_TYPE"}));
        assert!(assert_error_response(&resp, 400, Some("INVALID_FILE_TYPE")).is_ok());
        assert!(assert_error_response(&resp, 400, Some("invalid_file_type")).is_err());
        assert!(assert_error_response(&resp, 400, None).is_ok());
        assert!(assert_error_response(&resp, 401, None).is_err());
    }

    #[test]
    fn test_error_response_requires_error_field() {
        let resp = ApiResponse::json(400, json!({"code": "X"}));
        assert!(assert_error_response(&resp, 400, None).is_err());

        let raw = ApiResponse::new(
            400,
            Body::Raw("Bad Request".to_string()),
            Vec::<(String, String)>::new(),
            Duration::ZERO,
        );
        assert!(assert_error_response(&raw, 400, None).is_err());
    }

    #[test]
    fn test_error_response_without_body() {
        let resp = ApiResponse::timeout(Duration::ZERO);
        assert!(assert_error_response(&resp, 408, Some("ANY")).is_ok());
        assert!(assert_error_response(&ApiResponse::json(401, json!({})), 401, Some("X")).is_ok());
    }

    #[test]
    fn test_contract_compliance() {
        let validator = ContractValidator::from_document(ContractDocument::Empty);
        assert!(assert_contract_compliance(&validator, &ApiResponse::json(200, json!({})), "GET", "/health").is_ok());
        let err = assert_contract_compliance(&validator, &ApiResponse::json(418, json!({})), "GET", "/health")
            .unwrap_err();
        assert!(err.message.contains("Status: 418"));
    }

    #[test]
    fn test_status_in() {
        let resp = ApiResponse::json(204, json!({}));
        assert!(assert_status_in(&resp, &[200, 204]).is_ok());
        assert!(assert_status_in(&resp, &[200]).is_err());
    }
}
