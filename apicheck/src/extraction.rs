//! File extraction endpoint helpers.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;

use crate::assertions::{assert_error_response, assert_success_response};
use crate::client::{ApiClient, ApiResponse, FilePart};
use crate::ensure;
use crate::error::{Error, Result};

pub const EXTRACT_ENDPOINT: &str = "/api/v1/extractor/extract";
pub const RESULTS_ENDPOINT: &str = "/api/v1/extractor/results";

/// MIME type used when a caller does not pass one.
pub const DEFAULT_MIME: &str = "application/pdf";

pub const VALID_FILE_TYPES: [&str; 3] = ["application/pdf", "image/jpeg", "image/png"];
pub const INVALID_FILE_TYPES: [&str; 2] = ["application/x-msdownload", "application/octet-stream"];

/// Extensions the backend must reject.
pub const MALICIOUS_EXTENSIONS: [&str; 6] = [".exe", ".bat", ".sh", ".scr", ".cmd", ".com"];
pub const SAFE_EXTENSIONS: [&str; 4] = [".pdf", ".jpg", ".jpeg", ".png"];

/// Batch states reported by the results endpoint.
pub const BATCH_STATUSES: [&str; 3] = ["processing", "completed", "failed"];

/// Helpers for the extract and results endpoints.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionApi<'a> {
    client: &'a ApiClient,
}

impl<'a> ExtractionApi<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Uploads one local file.
    ///
    /// Fails with `MissingFixture` before any request if the file is absent.
    pub async fn upload_file(&self, path: &Path, mime: Option<&str>) -> Result<ApiResponse> {
        let part = FilePart::from_path(path, mime.unwrap_or(DEFAULT_MIME)).await?;
        Ok(self.upload_parts(vec![part]).await)
    }

    /// Uploads several local files in one batch.
    pub async fn upload_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        mime: Option<&str>,
    ) -> Result<ApiResponse> {
        let mime = mime.unwrap_or(DEFAULT_MIME);
        let mut parts = Vec::with_capacity(paths.len());
        for path in paths {
            parts.push(FilePart::from_path(path.as_ref(), mime).await?);
        }
        Ok(self.upload_parts(parts).await)
    }

    /// Uploads in-memory content under an arbitrary file name.
    pub async fn upload_named(
        &self,
        file_name: &str,
        bytes: impl Into<Bytes>,
        mime: Option<&str>,
    ) -> ApiResponse {
        let part = FilePart::new(file_name, bytes, mime.unwrap_or(DEFAULT_MIME));
        self.upload_parts(vec![part]).await
    }

    pub async fn upload_parts(&self, parts: Vec<FilePart>) -> ApiResponse {
        self.client.post(EXTRACT_ENDPOINT).files(parts).send().await
    }

    /// One GET of the results endpoint.
    pub async fn results(&self, batch_id: &str) -> ApiResponse {
        self.client.get(&results_path(batch_id)).send().await
    }

    /// Polls results until the batch is `completed` or `failed`, or attempts run out.
    ///
    /// Returns the last response seen.
    pub async fn poll_results(
        &self,
        batch_id: &str,
        attempts: usize,
        interval: Duration,
    ) -> ApiResponse {
        let mut last = self.results(batch_id).await;
        for _ in 1..attempts {
            if last.status_code() == 200
                && matches!(last.str_field("status"), Some("completed" | "failed"))
            {
                break;
            }
            tokio::time::sleep(interval).await;
            last = self.results(batch_id).await;
        }
        last
    }
}

pub fn results_path(batch_id: &str) -> String {
    format!("{}/{}", RESULTS_ENDPOINT, batch_id)
}

/// Asserts a 202 extraction start and returns the batch id.
pub fn assert_extraction_started(response: &ApiResponse) -> Result<String> {
    assert_success_response(response, 202)?;

    let batch_id = response
        .str_field("batch_id")
        .ok_or_else(|| Error::assertion(format!("Response should contain batch_id: {:?}", response.data())))?;
    ensure!(!batch_id.is_empty(), "batch_id should not be empty");
    ensure!(
        response.str_field("status") == Some("processing"),
        "Status should be 'processing', got {:?}",
        response.field("status")
    );
    ensure!(
        response.field("estimated_completion").is_some(),
        "Response should contain estimated_completion: {:?}",
        response.data()
    );
    Ok(batch_id.to_string())
}

/// Asserts a 200 results response carrying a `results` list.
pub fn assert_extraction_results(response: &ApiResponse) -> Result<()> {
    assert_success_response(response, 200)?;

    ensure!(
        response.field("batch_id").is_some(),
        "Results should contain batch_id: {:?}",
        response.data()
    );
    ensure!(
        response.field("status").is_some(),
        "Results should contain status: {:?}",
        response.data()
    );
    ensure!(
        response.field("results").is_some_and(|r| r.is_array()),
        "Results should contain a results list: {:?}",
        response.data()
    );
    Ok(())
}

/// Asserts a 400 `INVALID_FILE_TYPE` rejection with an explanatory message.
pub fn assert_malicious_file_rejected(response: &ApiResponse) -> Result<()> {
    assert_error_response(response, 400, Some("INVALID_FILE_TYPE"))?;

    let message = response
        .str_field("error")
        .unwrap_or_default()
        .to_lowercase();
    ensure!(
        ["invalid", "file", "type", "not allowed"]
            .iter()
            .any(|word| message.contains(word)),
        "Error message should indicate file type rejection: {:?}",
        response.data()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_results_path() {
        assert_eq!(results_path("b-1"), "/api/v1/extractor/results/b-1");
    }

    #[test]
    fn test_extraction_started() {
        let resp = ApiResponse::json(
            202,
            json!({"batch_id": "b-1", "status": "processing", "estimated_completion": "2026-01-01T00:00:00Z", "files_count": 1}),
        );
        assert_eq!(assert_extraction_started(&resp).unwrap(), "b-1");
    }

    #[test]
    fn test_extraction_started_requires_fields() {
        let resp = ApiResponse::json(202, json!({"batch_id": "b-1", "status": "processing"}));
        assert!(assert_extraction_started(&resp).is_err());

        let resp = ApiResponse::json(202, json!({"batch_id": "", "status": "processing", "estimated_completion": 1}));
        assert!(assert_extraction_started(&resp).is_err());

        let resp = ApiResponse::json(202, json!({"batch_id": "b", "status": "completed", "estimated_completion": 1}));
        assert!(assert_extraction_started(&resp).is_err());
    }

    #[test]
    fn test_extraction_results() {
        let resp = ApiResponse::json(200, json!({"batch_id": "b", "status": "completed", "results": []}));
        assert!(assert_extraction_results(&resp).is_ok());

        let resp = ApiResponse::json(200, json!({"batch_id": "b", "status": "completed", "results": {}}));
        assert!(assert_extraction_results(&resp).is_err());
    }

    #[test]
    fn test_malicious_rejection() {
        let resp = ApiResponse::json(
            400,
            json!({"error": "File type not allowed", "code": "INVALID_FILE_TYPE"}),
        );
        assert!(assert_malicious_file_rejected(&resp).is_ok());

        let resp = ApiResponse::json(400, json!({"error": "nope", "code": "INVALID_FILE_TYPE"}));
        assert!(assert_malicious_file_rejected(&resp).is_err());

        let resp = ApiResponse::json(400, json!({"error": "invalid file", "code": "FILE_TOO_LARGE"}));
        assert!(assert_malicious_file_rejected(&resp).is_err());
    }

    #[tokio::test]
    async fn test_upload_missing_file_fails_before_io() {
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1));
        let api = ExtractionApi::new(&client);
        let err = api
            .upload_file(Path::new("/nonexistent/sample.pdf"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::MissingFixture);
        assert!(err.message.contains("sample.pdf"));
    }
}
