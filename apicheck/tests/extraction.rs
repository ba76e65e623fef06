//! Extraction helpers against a local mock backend.

use std::time::Duration;

use apicheck::auth::{MockToken, SESSION_ENDPOINT};
use apicheck::client::ApiClient;
use apicheck::extraction::{ExtractionApi, assert_extraction_started};
use apicheck::testing::{ErrorFormat, MockBackend, MockBackendConfig};

const TIMEOUT: Duration = Duration::from_secs(5);

fn client(backend: &MockBackend) -> ApiClient {
    let token = MockToken::new().encode("test_secret").unwrap();
    ApiClient::new(backend.url(), TIMEOUT).with_bearer(&token)
}

#[tokio::test]
async fn test_poll_results_waits_for_terminal_status() {
    let backend = MockBackend::with_config(
        MockBackendConfig::default()
            .with_processing_delay(Duration::from_millis(400))
            .with_pending_status(Some("queued")),
    )
    .await
    .unwrap();
    let client = client(&backend);
    let api = ExtractionApi::new(&client);

    let upload = api.upload_named("report.pdf", &b"%PDF-1.4 report"[..], None).await;
    let batch_id = assert_extraction_started(&upload).unwrap();

    let interim = api.results(&batch_id).await;
    assert_eq!(interim.status_code(), 200);
    assert_eq!(interim.str_field("status"), Some("queued"));

    let last = api
        .poll_results(&batch_id, 20, Duration::from_millis(100))
        .await;
    assert_eq!(last.status_code(), 200);
    assert_eq!(last.str_field("status"), Some("completed"));
}

#[tokio::test]
async fn test_poll_results_keeps_going_without_status() {
    let backend = MockBackend::with_config(
        MockBackendConfig::default()
            .with_processing_delay(Duration::from_millis(400))
            .with_pending_status(None),
    )
    .await
    .unwrap();
    let client = client(&backend);
    let api = ExtractionApi::new(&client);

    let upload = api.upload_named("report.pdf", &b"%PDF-1.4 report"[..], None).await;
    let batch_id = assert_extraction_started(&upload).unwrap();

    let interim = api.results(&batch_id).await;
    assert!(interim.field("status").is_none());

    let last = api
        .poll_results(&batch_id, 20, Duration::from_millis(100))
        .await;
    assert_eq!(last.str_field("status"), Some("completed"));
}

#[tokio::test]
async fn test_poll_results_gives_up_after_attempts() {
    let backend = MockBackend::with_config(
        MockBackendConfig::default().with_processing_delay(Duration::from_secs(60)),
    )
    .await
    .unwrap();
    let client = client(&backend);
    let api = ExtractionApi::new(&client);

    let upload = api.upload_named("report.pdf", &b"%PDF-1.4 report"[..], None).await;
    let batch_id = assert_extraction_started(&upload).unwrap();
    let before = backend.request_count();

    let last = api
        .poll_results(&batch_id, 3, Duration::from_millis(10))
        .await;
    assert_eq!(last.str_field("status"), Some("processing"));
    assert_eq!(backend.request_count() - before, 3);
}

#[tokio::test]
async fn test_detail_error_format() {
    let backend = MockBackend::with_config(
        MockBackendConfig::default().with_error_format(ErrorFormat::Detail),
    )
    .await
    .unwrap();
    let client = ApiClient::new(backend.url(), TIMEOUT);

    let response = client.get(SESSION_ENDPOINT).send().await;

    assert_eq!(response.status_code(), 401);
    assert!(!response.has_error_field());
    assert_eq!(response.str_field("detail"), Some("Authentication required"));
    assert!(response.field("code").is_none());
}
