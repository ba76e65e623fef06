//! Extract and results endpoint scenarios.

use std::time::Duration;

use futures_util::future::join_all;

use crate::assertions::{
    assert_error_response, assert_response_time, assert_status_in, assert_success_response,
};
use crate::client::FilePart;
use crate::ensure;
use crate::error::{Error, Result};
use crate::extraction::{
    BATCH_STATUSES, DEFAULT_MIME, EXTRACT_ENDPOINT, assert_extraction_results,
    assert_extraction_started, assert_malicious_file_rejected, results_path,
};
use crate::fixtures::oversized_file;
use crate::rate_limit::{RATE_LIMIT_CODE, assert_rate_limited, burst};

use super::{BoxFuture, Context, Marker, Scenario};

const MODULE: &str = "file_extraction";

/// Minimum valid PDFs needed for the batch scenario.
const MIN_BATCH_FILES: usize = 3;
const CONCURRENT_UPLOADS: usize = 5;
const WORKFLOW_POLL_ATTEMPTS: usize = 30;
const WORKFLOW_POLL_INTERVAL: Duration = Duration::from_secs(1);

const PATH_TRAVERSAL_NAME: &str = "../../malicious.pdf";
const MINIMAL_PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< >>\nendobj";

pub(super) fn scenarios() -> Vec<Scenario> {
    use Marker::*;
    vec![
        Scenario::new("extract_files_success", MODULE, &[Contract, RequiresBackend], extract_files_success),
        Scenario::new("extract_files_invalid_type", MODULE, &[Contract, RequiresBackend], extract_files_invalid_type),
        Scenario::new("extract_files_unauthorized", MODULE, &[Contract, RequiresBackend], extract_files_unauthorized),
        Scenario::new("extract_files_oversized", MODULE, &[Contract, RequiresBackend], extract_files_oversized),
        Scenario::new("extract_batch_processing_limit", MODULE, &[Contract, RequiresBackend], extract_batch_processing_limit),
        Scenario::new("extract_files_missing_file", MODULE, &[Contract, RequiresBackend], extract_files_missing_file),
        Scenario::new("extract_files_rate_limit", MODULE, &[RateLimit, RequiresBackend], extract_files_rate_limit),
        Scenario::new("get_results_success", MODULE, &[Contract, RequiresBackend], get_results_success),
        Scenario::new("get_results_not_found", MODULE, &[Contract, RequiresBackend], get_results_not_found),
        Scenario::new("get_results_unauthorized", MODULE, &[Contract, RequiresBackend], get_results_unauthorized),
        Scenario::new("malicious_file_rejection", MODULE, &[Security, RequiresBackend], malicious_file_rejection),
        Scenario::new("script_injection_prevention", MODULE, &[Security, RequiresBackend], script_injection_prevention),
        Scenario::new("path_traversal_prevention", MODULE, &[Security, RequiresBackend], path_traversal_prevention),
        Scenario::new("concurrent_upload_handling", MODULE, &[Security, RequiresBackend], concurrent_upload_handling),
        Scenario::new("complete_extraction_workflow", MODULE, &[Integration, RequiresBackend], complete_extraction_workflow),
    ]
}

fn extract_files_success(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let sample = ctx.fixtures().sample_aktr()?;
        let client = ctx.authenticated()?;
        let api = ctx.extraction(&client);

        let response = ctx
            .monitor()
            .measure("file_extraction_success", api.upload_file(&sample, Some(DEFAULT_MIME)))
            .await??;

        assert_extraction_started(&response)?;
        assert_response_time(&response)?;
        ctx.check_contract(&response, "POST", EXTRACT_ENDPOINT)?;

        ensure!(
            response.field("batch_id").is_some_and(|v| v.is_string()),
            "batch_id should be string"
        );
        ensure!(
            response.field("files_count").is_some() || response.field("files").is_some(),
            "should contain files count or files array"
        );
        Ok(())
    })
}

fn extract_files_invalid_type(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let exe = ctx.fixtures().malicious_exe()?;
        let client = ctx.authenticated()?;

        let response = ctx
            .extraction(&client)
            .upload_file(&exe, Some("application/x-msdownload"))
            .await?;

        assert_error_response(&response, 400, Some("INVALID_FILE_TYPE"))?;
        ctx.check_contract(&response, "POST", EXTRACT_ENDPOINT)?;

        ensure!(
            response.field("code").is_some(),
            "Error response should contain 'code' field"
        );
        ensure!(
            response.field("error").is_some_and(|v| v.is_string()),
            "Error message should be string"
        );
        Ok(())
    })
}

fn extract_files_unauthorized(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let response = ctx.client().post(EXTRACT_ENDPOINT).send().await;

        assert_error_response(&response, 401, None)?;
        ctx.check_contract(&response, "POST", EXTRACT_ENDPOINT)
    })
}

fn extract_files_oversized(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let size = ctx.config().max_file_size + 1024 * 1024;
        let large = oversized_file(size)?;
        let client = ctx.authenticated()?;

        let response = ctx
            .extraction(&client)
            .upload_file(large.path(), Some(DEFAULT_MIME))
            .await?;

        assert_error_response(&response, 400, Some("FILE_TOO_LARGE"))?;
        ctx.check_contract(&response, "POST", EXTRACT_ENDPOINT)
    })
}

fn extract_batch_processing_limit(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let available = ctx.fixtures().valid_pdfs()?;
        if available.len() < MIN_BATCH_FILES {
            return Err(Error::skipped(format!(
                "Need at least {} test files for batch testing",
                MIN_BATCH_FILES
            )));
        }

        let limit = ctx.config().max_files_per_batch;
        let files = &available[..available.len().min(limit)];
        let client = ctx.authenticated()?;

        let response = ctx.extraction(&client).upload_files(files, None).await?;

        assert_extraction_started(&response)?;
        ctx.check_contract(&response, "POST", EXTRACT_ENDPOINT)
    })
}

fn extract_files_missing_file(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let client = ctx.authenticated()?;
        let response = client.post(EXTRACT_ENDPOINT).send().await;

        assert_error_response(&response, 400, Some("NO_FILES_PROVIDED"))?;
        ctx.check_contract(&response, "POST", EXTRACT_ENDPOINT)
    })
}

fn extract_files_rate_limit(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let sample = ctx.fixtures().sample_aktr()?;
        let part = FilePart::from_path(&sample, DEFAULT_MIME).await?;
        let client = ctx.authenticated()?;
        let api = ctx.extraction(&client);
        let limit = ctx.config().rate_limit as usize;

        let responses = burst(limit, || api.upload_parts(vec![part.clone()])).await;

        assert_rate_limited(&responses, limit)?;
        for response in responses.iter().filter(|r| r.status_code() == 429) {
            ctx.check_contract(response, "POST", EXTRACT_ENDPOINT)?;
            assert_error_response(response, 429, Some(RATE_LIMIT_CODE))?;
        }
        Ok(())
    })
}

fn get_results_success(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let sample = ctx.fixtures().sample_aktr()?;
        let client = ctx.authenticated()?;
        let api = ctx.extraction(&client);

        let upload = api.upload_file(&sample, None).await?;
        let batch_id = assert_extraction_started(&upload)?;

        let response = api.results(&batch_id).await;
        assert_success_response(&response, 200)?;
        ctx.check_contract(&response, "GET", &results_path(&batch_id))?;

        ensure!(response.field("batch_id").is_some(), "Results should contain batch_id");
        let status = response.str_field("status");
        ensure!(
            status.is_some_and(|s| BATCH_STATUSES.contains(&s)),
            "Status should be valid, got {:?}",
            status
        );

        if status == Some("completed") {
            assert_extraction_results(&response)?;
        }
        Ok(())
    })
}

fn get_results_not_found(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let batch_id = "batch_nonexistent_12345";
        let client = ctx.authenticated()?;

        let response = ctx.extraction(&client).results(batch_id).await;

        assert_error_response(&response, 404, Some("BATCH_NOT_FOUND"))?;
        ctx.check_contract(&response, "GET", &results_path(batch_id))
    })
}

fn get_results_unauthorized(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let response = ctx.extraction(ctx.client()).results("batch_123").await;

        assert_error_response(&response, 401, None)?;
        ctx.check_contract(&response, "GET", &results_path("batch_123"))
    })
}

fn malicious_file_rejection(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let exe = ctx.fixtures().malicious_exe()?;
        let client = ctx.authenticated()?;

        let response = ctx
            .extraction(&client)
            .upload_file(&exe, Some("application/octet-stream"))
            .await?;

        assert_malicious_file_rejected(&response)
    })
}

/// The backend may either reject the file or accept it with a sanitized name.
fn script_injection_prevention(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let file = ctx.fixtures().script_injection()?;
        let client = ctx.authenticated()?;

        let response = ctx.extraction(&client).upload_file(&file, None).await?;

        match response.status_code() {
            400 => assert_malicious_file_rejected(&response),
            202 => assert_extraction_started(&response).map(|_| ()),
            status => {
                tracing::info!(status, "script injection upload neither rejected nor accepted");
                Ok(())
            }
        }
    })
}

fn path_traversal_prevention(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let client = ctx.authenticated()?;

        let response = ctx
            .extraction(&client)
            .upload_named(PATH_TRAVERSAL_NAME, MINIMAL_PDF, Some(DEFAULT_MIME))
            .await;

        assert_status_in(&response, &[200, 202, 400])
    })
}

fn concurrent_upload_handling(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let sample = ctx.fixtures().sample_aktr()?;
        let part = FilePart::from_path(&sample, DEFAULT_MIME).await?;
        let client = ctx.authenticated()?;
        let api = ctx.extraction(&client);

        let uploads = (0..CONCURRENT_UPLOADS).map(|_| api.upload_parts(vec![part.clone()]));
        let responses = join_all(uploads).await;

        for response in &responses {
            ensure!(
                matches!(response.status_code(), 202 | 429),
                "Concurrent upload should succeed or hit rate limit, got {}",
                response.status_code()
            );
        }
        Ok(())
    })
}

fn complete_extraction_workflow(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let sample = ctx.fixtures().sample_aktr()?;
        let client = ctx.authenticated()?;
        let api = ctx.extraction(&client);

        let workflow = async {
            let upload = api.upload_file(&sample, None).await?;
            let batch_id = assert_extraction_started(&upload)?;

            let response = api
                .poll_results(&batch_id, WORKFLOW_POLL_ATTEMPTS, WORKFLOW_POLL_INTERVAL)
                .await;
            assert_success_response(&response, 200)?;

            let status = response.str_field("status");
            ensure!(
                matches!(status, Some("completed" | "failed")),
                "Final status should be completed or failed, got {:?}",
                status
            );

            if status == Some("completed") {
                assert_extraction_results(&response)?;
                let count = response
                    .field("results")
                    .and_then(|r| r.as_array())
                    .map_or(0, Vec::len);
                ensure!(count > 0, "Should have at least one result");
            }
            Ok::<_, Error>(())
        };

        ctx.monitor()
            .measure("complete_extraction_workflow", workflow)
            .await?
    })
}
