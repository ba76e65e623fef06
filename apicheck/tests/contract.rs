//! Contract validation of live mock-backend responses.

use std::time::Duration;

use apicheck::assertions::assert_contract_compliance;
use apicheck::auth::SESSION_ENDPOINT;
use apicheck::client::ApiClient;
use apicheck::openapi::{Compliance, ContractValidator, ResponseValidator};
use apicheck::testing::MockBackend;

const DOCUMENT: &str = r#"
paths:
  /health:
    get:
      responses:
        "200":
          description: healthy
  /api/v1/auth/session:
    get:
      responses:
        "200": {}
        "401": {}
"#;

fn write_document(dir: &tempfile::TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("openapi.yaml");
    std::fs::write(&path, text).unwrap();
    path
}

#[tokio::test]
async fn test_declared_responses_are_compliant() {
    let backend = MockBackend::start().await.unwrap();
    let client = ApiClient::new(backend.url(), Duration::from_secs(5));
    let dir = tempfile::tempdir().unwrap();
    let validator = ContractValidator::new(write_document(&dir, DOCUMENT));

    let health = client.get("/health").send().await;
    assert_eq!(
        validator.validate("GET", "/health", health.status_code(), health.data()),
        Compliance::Compliant
    );

    let session = client.get(SESSION_ENDPOINT).send().await;
    assert_eq!(session.status_code(), 401);
    assert!(assert_contract_compliance(&validator, &session, "GET", SESSION_ENDPOINT).is_ok());
}

#[tokio::test]
async fn test_undeclared_uncommon_status_is_non_compliant() {
    let backend = MockBackend::start().await.unwrap();
    let client = ApiClient::new(backend.url(), Duration::from_secs(5));
    let dir = tempfile::tempdir().unwrap();
    let validator = ContractValidator::new(write_document(&dir, DOCUMENT));

    let response = client.put("/health").send().await;
    assert_eq!(response.status_code(), 405);

    assert_eq!(
        validator.validate("PUT", "/health", response.status_code(), response.data()),
        Compliance::NonCompliant
    );
    let err = assert_contract_compliance(&validator, &response, "PUT", "/health").unwrap_err();
    assert!(err.message.contains("Status: 405"));
}

#[test]
fn test_document_loaded_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_document(&dir, DOCUMENT);
    let validator = ContractValidator::new(&path);
    assert!(!validator.is_loaded());

    assert!(validator.validate("GET", "/health", 200, None).is_acceptable());
    assert!(validator.is_loaded());

    // Later edits are not picked up.
    std::fs::write(&path, "paths: {}\n").unwrap();
    assert_eq!(validator.validate("GET", "/health", 204, None), Compliance::NonCompliant);
    std::fs::write(&path, "paths:\n  /health:\n    get:\n      responses:\n        \"204\": {}\n").unwrap();
    assert_eq!(validator.validate("GET", "/health", 204, None), Compliance::NonCompliant);
}

#[test]
fn test_missing_document_uses_allow_list() {
    let validator = ContractValidator::new("/nonexistent/openapi.yaml");
    assert_eq!(validator.validate("GET", "/x", 429, None), Compliance::Compliant);
    assert_eq!(validator.validate("GET", "/x", 418, None), Compliance::NonCompliant);
}

#[test]
fn test_unreadable_document_is_indeterminate() {
    let dir = tempfile::tempdir().unwrap();
    let validator = ContractValidator::new(write_document(&dir, "paths: [unclosed"));

    let compliance = validator.validate("GET", "/health", 418, None);
    assert_eq!(compliance, Compliance::Indeterminate);
    assert!(compliance.is_acceptable());
}
