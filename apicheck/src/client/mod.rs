//! HTTP request executor.
//!
//! [`ApiClient`] wraps one pooled `reqwest::Client` for the whole session and
//! turns every call into an [`ApiResponse`], measuring wall-clock duration and
//! mapping transport failures to sentinel statuses.
//!
//! # Examples
//!
//! ```no_run
//! use apicheck::client::ApiClient;
//! use std::time::Duration;
//!
//! # async fn demo() {
//! let client = ApiClient::new("http://localhost:8000", Duration::from_secs(30))
//!     .with_bearer("test-token");
//!
//! let response = client.get("/health").send().await;
//! println!("{} in {:.3}s", response.status_code(), response.duration_secs());
//! # }
//! ```

mod method;
mod request;
mod response;

use std::time::Duration;

pub use method::HttpMethod;
pub use request::{FilePart, RequestBuilder};
pub use response::{
    ApiResponse, Body, CONNECTION_FAILED_STATUS, REQUEST_FAILED_STATUS, TIMEOUT_STATUS,
};

use crate::config::TestConfig;
use crate::error::Result;

/// Executes requests against one backend.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_headers: Vec<(String, String)>,
    timeout: Duration,
}

impl ApiClient {
    /// Creates a client for `base_url` with a default per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            auth_headers: Vec::new(),
            timeout,
        }
    }

    pub fn from_config(config: &TestConfig) -> Self {
        Self::new(&config.backend_base_url, config.api_timeout)
    }

    /// Returns a client sharing this pool whose requests carry `headers`.
    ///
    /// Per-call headers still override these.
    pub fn with_auth_headers<I, K, V>(&self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut client = self.clone();
        for (k, v) in headers {
            request::merge_header(&mut client.auth_headers, k.as_ref(), v.as_ref());
        }
        client
    }

    /// Shorthand for an `Authorization: Bearer <token>` base header.
    pub fn with_bearer(&self, token: &str) -> Self {
        self.with_auth_headers([("Authorization", format!("Bearer {}", token))])
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_headers(&self) -> &[(String, String)] {
        &self.auth_headers
    }

    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    /// Joins `path` onto the base URL. Absolute URLs are used as-is.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn get(&self, path: &str) -> RequestBuilder<'_> {
        self.method(HttpMethod::Get, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder<'_> {
        self.method(HttpMethod::Post, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder<'_> {
        self.method(HttpMethod::Put, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder<'_> {
        self.method(HttpMethod::Delete, path)
    }

    pub fn options(&self, path: &str) -> RequestBuilder<'_> {
        self.method(HttpMethod::Options, path)
    }

    pub fn method(&self, method: HttpMethod, path: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, path)
    }

    /// Creates a request from a method name.
    ///
    /// Fails with `UnsupportedMethod` for anything other than
    /// GET/POST/PUT/DELETE/OPTIONS, before any network I/O.
    pub fn request(&self, method: &str, path: &str) -> Result<RequestBuilder<'_>> {
        let method: HttpMethod = method.parse()?;
        Ok(self.method(method, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("http://localhost:8000/", Duration::from_secs(1));
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/health"), "http://localhost:8000/health");
        assert_eq!(client.url("health"), "http://localhost:8000/health");
        assert_eq!(
            client.url("https://other.example/health"),
            "https://other.example/health"
        );
    }

    #[test]
    fn test_request_rejects_unsupported_method() {
        let client = ApiClient::new("http://localhost:8000", Duration::from_secs(1));
        let err = client.request("PATCH", "/health").err().unwrap();
        assert_eq!(err.kind, ErrorKind::UnsupportedMethod);
        assert!(client.request("options", "/health").is_ok());
    }

    #[test]
    fn test_with_bearer_overrides() {
        let client = ApiClient::new("http://localhost:8000", Duration::from_secs(1))
            .with_bearer("one")
            .with_auth_headers([("authorization", "Bearer two")]);
        assert_eq!(client.auth_headers().len(), 1);
        assert_eq!(client.auth_headers()[0].1, "Bearer two");
    }

    #[test]
    fn test_from_config() {
        let config = TestConfig::for_backend("http://127.0.0.1:1/")
            .with_api_timeout(Duration::from_secs(7));
        let client = ApiClient::from_config(&config);
        assert_eq!(client.base_url(), "http://127.0.0.1:1");
        assert_eq!(client.default_timeout(), Duration::from_secs(7));
    }
}
