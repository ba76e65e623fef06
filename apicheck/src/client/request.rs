use std::path::Path;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use super::{ApiClient, ApiResponse, Body, HttpMethod};
use crate::error::{Error, Result};

/// One file of a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Form field name, `files` by default.
    pub field: String,
    pub file_name: String,
    pub bytes: Bytes,
    pub mime: String,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>, mime: impl Into<String>) -> Self {
        Self {
            field: "files".to_string(),
            file_name: file_name.into(),
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    /// Reads a local file, failing before any I/O on the network if it does not exist.
    pub async fn from_path(path: &Path, mime: &str) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::missing_fixture(path));
        }
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, bytes, mime))
    }

    /// Sets the form field name.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.field = name.into();
        self
    }

    fn to_part(&self) -> std::result::Result<Part, reqwest::Error> {
        Part::bytes(self.bytes.to_vec())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime)
    }
}

/// Builds a header map, skipping empty names.
fn build_headers(input: &[(String, String)]) -> std::result::Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        if key.is_empty() {
            continue;
        }

        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| format!("Invalid header name `{key}`: {err}"))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| format!("Invalid header value for `{key}`: {err}"))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

/// Inserts or replaces a header, comparing names case-insensitively.
pub(crate) fn merge_header(headers: &mut Vec<(String, String)>, key: &str, value: &str) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    headers.push((key.to_string(), value.to_string()));
}

/// Builder for a single executor call.
///
/// Created through [`ApiClient`]; consumed by [`send`](Self::send).
#[derive(Debug)]
#[must_use = "requests do nothing until sent"]
pub struct RequestBuilder<'a> {
    client: &'a ApiClient,
    method: HttpMethod,
    path: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    json: Option<Value>,
    files: Vec<FilePart>,
    timeout: Option<Duration>,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(client: &'a ApiClient, method: HttpMethod, path: &str) -> Self {
        Self {
            client,
            method,
            path: path.to_string(),
            headers: client.auth_headers().to_vec(),
            query: Vec::new(),
            json: None,
            files: Vec::new(),
            timeout: None,
        }
    }

    /// Adds a header, replacing a base header of the same name.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        merge_header(&mut self.headers, key, value);
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (k, v) in headers {
            merge_header(&mut self.headers, k.as_ref(), v.as_ref());
        }
        self
    }

    /// Drops a header, including one inherited from the client.
    pub fn without_header(mut self, key: &str) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Sets a JSON body. Ignored when files are attached.
    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    /// Attaches a multipart file.
    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    pub fn files(mut self, parts: impl IntoIterator<Item = FilePart>) -> Self {
        self.files.extend(parts);
        self
    }

    /// Overrides the client's default timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Performs exactly one network call.
    ///
    /// Transport failures are returned as sentinel responses, never as errors.
    pub async fn send(self) -> ApiResponse {
        let method = self.method;
        let path = self.path.clone();
        let start = Instant::now();

        let request = match self.build() {
            Ok(request) => request,
            Err(reason) => {
                let response = ApiResponse::request_failed(reason, start.elapsed());
                tracing::warn!(%method, path = %path, error = response.error(), "request not sent");
                return response;
            }
        };

        let outcome = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let headers: Vec<(String, String)> = response
                .headers()
                .iter()
                .map(|(k, v)| {
                    (
                        k.as_str().to_string(),
                        String::from_utf8_lossy(v.as_bytes()).into_owned(),
                    )
                })
                .collect();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, headers, text))
        }
        .await;
        let duration = start.elapsed();

        match outcome {
            Ok((status, headers, text)) => {
                tracing::debug!(
                    %method,
                    path = %path,
                    status,
                    duration_ms = duration.as_millis() as u64,
                    "request completed"
                );
                ApiResponse::new(status, Body::parse(&text), headers, duration)
            }
            Err(err) => {
                let response = ApiResponse::from_transport_error(&err, duration);
                tracing::warn!(
                    %method,
                    path = %path,
                    status = response.status_code(),
                    duration_ms = duration.as_millis() as u64,
                    error = %err,
                    "request failed"
                );
                response
            }
        }
    }

    fn build(self) -> std::result::Result<reqwest::RequestBuilder, String> {
        let mut headers = self.headers;
        let multipart = !self.files.is_empty() && self.method.allows_body();
        if multipart {
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case("content-type"));
        }
        let headers = build_headers(&headers)?;

        let url = self.client.url(&self.path);
        let mut request = self
            .client
            .http()
            .request(self.method.to_reqwest(), &url)
            .headers(headers)
            .timeout(self.timeout.unwrap_or(self.client.default_timeout()));

        if !self.query.is_empty() {
            request = request.query(&self.query);
        }

        if multipart {
            let mut form = Form::new();
            for file in &self.files {
                let part = file
                    .to_part()
                    .map_err(|err| format!("Invalid file part `{}`: {err}", file.file_name))?;
                form = form.part(file.field.clone(), part);
            }
            request = request.multipart(form);
        } else if let Some(body) = self.json.filter(|_| self.method.allows_body()) {
            request = request.json(&body);
        }

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_header_case_insensitive() {
        let mut headers = vec![("Authorization".to_string(), "Bearer a".to_string())];
        merge_header(&mut headers, "authorization", "Bearer b");
        assert_eq!(headers, vec![("authorization".to_string(), "Bearer b".to_string())]);
    }

    #[test]
    fn test_build_headers_rejects_invalid_name() {
        let input = vec![("bad header".to_string(), "x".to_string())];
        let err = build_headers(&input).unwrap_err();
        assert!(err.contains("Invalid header name"));
    }

    #[test]
    fn test_build_headers_skips_empty_names() {
        let input = vec![
            (String::new(), "x".to_string()),
            ("x-test".to_string(), "1".to_string()),
        ];
        let headers = build_headers(&input).unwrap();
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_file_part_defaults() {
        let part = FilePart::new("a.pdf", b"%PDF-1.4".to_vec(), "application/pdf");
        assert_eq!(part.field, "files");
        assert_eq!(part.file_name, "a.pdf");
        assert_eq!(part.field("document").field, "document");
    }

    #[tokio::test]
    async fn test_file_part_missing_path() {
        let err = FilePart::from_path(Path::new("/nonexistent/a.pdf"), "application/pdf")
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::MissingFixture);
    }

    #[tokio::test]
    async fn test_file_part_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();

        let part = FilePart::from_path(&path, "application/pdf").await.unwrap();
        assert_eq!(part.file_name, "doc.pdf");
        assert_eq!(&part.bytes[..4], b"%PDF");
    }
}
