use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

/// Status used when the request timed out.
pub const TIMEOUT_STATUS: u16 = 408;
/// Status used when no connection could be established.
pub const CONNECTION_FAILED_STATUS: u16 = 503;
/// Status used for any other transport failure.
pub const REQUEST_FAILED_STATUS: u16 = 500;

/// A response body: parsed JSON, or the raw text when it was not JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Raw(String),
}

impl Body {
    /// Parses `text` as JSON, falling back to [`Body::Raw`].
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => Body::Json(value),
            Err(_) => Body::Raw(text.to_string()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            Body::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Body::Raw(text) => Some(text),
            Body::Json(_) => None,
        }
    }

    /// Looks up a top-level field of a JSON object body.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_json().and_then(|v| v.get(key))
    }

    /// True for a raw body with no content.
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Raw(text) if text.trim().is_empty())
    }
}

/// The outcome of one request attempt.
///
/// Every executor call yields exactly one `ApiResponse`, including transport
/// failures, which carry a sentinel status ([`TIMEOUT_STATUS`],
/// [`CONNECTION_FAILED_STATUS`] or [`REQUEST_FAILED_STATUS`]), no body, and
/// an [`error`](Self::error) message.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    status_code: u16,
    data: Option<Body>,
    error: Option<String>,
    headers: BTreeMap<String, String>,
    duration: Duration,
}

impl ApiResponse {
    /// Creates a response received from the server.
    ///
    /// Header names are stored lowercase.
    pub fn new<I, K, V>(status_code: u16, data: Body, headers: I, duration: Duration) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            status_code,
            data: Some(data),
            error: None,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
                .collect(),
            duration,
        }
    }

    /// A response with a JSON body and no headers.
    pub fn json(status_code: u16, data: Value) -> Self {
        Self::new(
            status_code,
            Body::Json(data),
            Vec::<(String, String)>::new(),
            Duration::ZERO,
        )
    }

    fn sentinel(status_code: u16, error: String, duration: Duration) -> Self {
        Self {
            status_code,
            data: None,
            error: Some(error),
            headers: BTreeMap::new(),
            duration,
        }
    }

    pub fn timeout(duration: Duration) -> Self {
        Self::sentinel(TIMEOUT_STATUS, "Request timeout".to_string(), duration)
    }

    pub fn connection_failed(duration: Duration) -> Self {
        Self::sentinel(
            CONNECTION_FAILED_STATUS,
            "Connection failed".to_string(),
            duration,
        )
    }

    pub fn request_failed(reason: impl std::fmt::Display, duration: Duration) -> Self {
        Self::sentinel(
            REQUEST_FAILED_STATUS,
            format!("Request failed: {}", reason),
            duration,
        )
    }

    pub(crate) fn from_transport_error(err: &reqwest::Error, duration: Duration) -> Self {
        if err.is_timeout() {
            Self::timeout(duration)
        } else if err.is_connect() {
            Self::connection_failed(duration)
        } else {
            Self::request_failed(err, duration)
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn data(&self) -> Option<&Body> {
        self.data.as_ref()
    }

    /// The body as JSON, if it parsed.
    pub fn json_body(&self) -> Option<&Value> {
        self.data.as_ref().and_then(Body::as_json)
    }

    /// A top-level field of a JSON object body.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|b| b.get(key))
    }

    /// A top-level string field of a JSON object body.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    /// The body's `code` field.
    pub fn code(&self) -> Option<&str> {
        self.str_field("code")
    }

    /// True when the JSON body carries a non-null `error` field.
    pub fn has_error_field(&self) -> bool {
        self.field("error").is_some_and(|v| !v.is_null())
    }

    /// Transport-level error message, set only on sentinel responses.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// True for locally substituted transport-failure responses.
    pub fn is_transport_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_parse_json() {
        let body = Body::parse(r#"{"status":"ok"}"#);
        assert_eq!(body.get("status"), Some(&json!("ok")));
        assert!(body.as_raw().is_none());
    }

    #[test]
    fn test_body_parse_raw_fallback() {
        let body = Body::parse("User-agent: *");
        assert_eq!(body.as_raw(), Some("User-agent: *"));
        assert!(body.get("status").is_none());
        assert!(!body.is_empty());
        assert!(Body::parse("").is_empty());
    }

    #[test]
    fn test_headers_lowercased() {
        let resp = ApiResponse::new(
            200,
            Body::Json(json!({})),
            [("X-Frame-Options", "DENY")],
            Duration::from_millis(5),
        );
        assert_eq!(resp.header("x-frame-options"), Some("DENY"));
        assert_eq!(resp.header("X-FRAME-OPTIONS"), Some("DENY"));
        assert!(resp.headers().contains_key("x-frame-options"));
    }

    #[test]
    fn test_sentinels() {
        let resp = ApiResponse::timeout(Duration::from_millis(100));
        assert_eq!(resp.status_code(), 408);
        assert_eq!(resp.error(), Some("Request timeout"));
        assert!(resp.data().is_none());
        assert!(resp.headers().is_empty());
        assert_eq!(resp.duration(), Duration::from_millis(100));

        let resp = ApiResponse::connection_failed(Duration::ZERO);
        assert_eq!(resp.status_code(), 503);
        assert_eq!(resp.error(), Some("Connection failed"));

        let resp = ApiResponse::request_failed("boom", Duration::ZERO);
        assert_eq!(resp.status_code(), 500);
        assert_eq!(resp.error(), Some("Request failed: boom"));
        assert!(resp.is_transport_failure());
    }

    #[test]
    fn test_error_field_detection() {
        assert!(ApiResponse::json(400, json!({"error": "bad"})).has_error_field());
        assert!(!ApiResponse::json(200, json!({"error": null})).has_error_field());
        assert!(!ApiResponse::json(200, json!({"ok": true})).has_error_field());
    }

    #[test]
    fn test_code_accessor() {
        let resp = ApiResponse::json(429, json!({"error": "slow down", "code": "RATE_LIMIT_EXCEEDED"}));
        assert_eq!(resp.code(), Some("RATE_LIMIT_EXCEEDED"));
        assert_eq!(resp.str_field("error"), Some("slow down"));
    }
}
