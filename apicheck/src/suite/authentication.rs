//! Session, token, webhook and organization scenarios.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::future::join_all;
use serde_json::Value;

use crate::assertions::{assert_error_response, assert_ok, assert_status_in};
use crate::auth::{
    MockToken, REFRESH_ENDPOINT, SESSION_ENDPOINT, STATUS_ENDPOINT, WEBHOOK_ENDPOINT,
    generate_user_data, webhook_headers, webhook_payload,
};
use crate::client::{ApiClient, ApiResponse};
use crate::ensure;
use crate::error::Result;
use crate::extraction::assert_extraction_started;

use super::{BoxFuture, Context, Marker, Scenario};

const MODULE: &str = "authentication";

const SESSION_CHECKS: usize = 5;
const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(1);
const CONCURRENT_SESSIONS: usize = 3;

pub(super) fn scenarios() -> Vec<Scenario> {
    use Marker::*;
    vec![
        Scenario::new("session_endpoint_success", MODULE, &[Contract, ClerkIntegration, RequiresBackend], session_endpoint_success),
        Scenario::new("session_endpoint_unauthorized", MODULE, &[Contract, ClerkIntegration, RequiresBackend], session_endpoint_unauthorized),
        Scenario::new("session_endpoint_invalid_token", MODULE, &[Contract, ClerkIntegration, RequiresBackend], session_endpoint_invalid_token),
        Scenario::new("token_refresh_success", MODULE, &[Contract, ClerkIntegration, RequiresBackend], token_refresh_success),
        Scenario::new("auth_status_endpoint", MODULE, &[Contract, ClerkIntegration, RequiresBackend], auth_status_endpoint),
        Scenario::new("clerk_webhook_user_created", MODULE, &[ClerkIntegration, RequiresBackend], clerk_webhook_user_created),
        Scenario::new("clerk_webhook_user_updated", MODULE, &[ClerkIntegration, RequiresBackend], clerk_webhook_user_updated),
        Scenario::new("clerk_webhook_user_deleted", MODULE, &[ClerkIntegration, RequiresBackend], clerk_webhook_user_deleted),
        Scenario::new("clerk_webhook_invalid_signature", MODULE, &[ClerkIntegration, RequiresBackend], clerk_webhook_invalid_signature),
        Scenario::new("clerk_webhook_missing_headers", MODULE, &[ClerkIntegration, RequiresBackend], clerk_webhook_missing_headers),
        Scenario::new("clerk_webhook_unknown_event_type", MODULE, &[ClerkIntegration, RequiresBackend], clerk_webhook_unknown_event_type),
        Scenario::new("expired_token_handling", MODULE, &[Auth, RequiresBackend], expired_token_handling),
        Scenario::new("malformed_token_handling", MODULE, &[Auth, RequiresBackend], malformed_token_handling),
        Scenario::new("token_with_wrong_issuer", MODULE, &[Auth, RequiresBackend], token_with_wrong_issuer),
        Scenario::new("token_with_missing_claims", MODULE, &[Auth, RequiresBackend], token_with_missing_claims),
        Scenario::new("organization_member_access", MODULE, &[Auth, RequiresBackend], organization_member_access),
        Scenario::new("organization_admin_privileges", MODULE, &[Auth, RequiresBackend], organization_admin_privileges),
        Scenario::new("cross_organization_access_denied", MODULE, &[Auth, RequiresBackend], cross_organization_access_denied),
        Scenario::new("authentication_during_file_processing", MODULE, &[Integration, Auth, RequiresBackend], authentication_during_file_processing),
        Scenario::new("concurrent_authentication_sessions", MODULE, &[Integration, Auth, RequiresBackend], concurrent_authentication_sessions),
    ]
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// GET the session endpoint with a client authenticated by `token`.
async fn session_with(ctx: &Context, token: &MockToken) -> Result<ApiResponse> {
    let client = ctx.client_with(token)?;
    Ok(client.get(SESSION_ENDPOINT).send().await)
}

/// GET the session endpoint with a raw `Authorization: Bearer` value.
async fn session_with_raw(ctx: &Context, token: &str) -> ApiResponse {
    ctx.client().with_bearer(token).get(SESSION_ENDPOINT).send().await
}

async fn post_webhook(client: &ApiClient, headers: Vec<(String, String)>, payload: Value) -> ApiResponse {
    client
        .post(WEBHOOK_ENDPOINT)
        .headers(headers)
        .json(payload)
        .send()
        .await
}

fn user_field<'a>(response: &'a ApiResponse, key: &str) -> Option<&'a Value> {
    response.field("user").and_then(|user| user.get(key))
}

fn session_endpoint_success(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let response = session_with(ctx, &ctx.token()).await?;

        assert_ok(&response)?;
        ctx.check_contract(&response, "GET", SESSION_ENDPOINT)?;

        ensure!(response.field("user").is_some(), "Session response should contain user");
        ensure!(
            response.field("session").is_some(),
            "Session response should contain session info"
        );
        ensure!(user_field(&response, "id").is_some(), "User should have id");
        ensure!(user_field(&response, "email").is_some(), "User should have email");
        Ok(())
    })
}

fn session_endpoint_unauthorized(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let response = ctx.client().get(SESSION_ENDPOINT).send().await;

        assert_error_response(&response, 401, None)?;
        ctx.check_contract(&response, "GET", SESSION_ENDPOINT)
    })
}

fn session_endpoint_invalid_token(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let response = session_with_raw(ctx, "invalid_token_123").await;

        assert_error_response(&response, 401, None)?;
        ctx.check_contract(&response, "GET", SESSION_ENDPOINT)
    })
}

fn token_refresh_success(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let client = ctx.authenticated()?;
        let response = client.post(REFRESH_ENDPOINT).send().await;

        assert_ok(&response)?;
        ctx.check_contract(&response, "POST", REFRESH_ENDPOINT)?;

        ensure!(
            response.field("token").is_some(),
            "Refresh response should contain new token"
        );
        ensure!(
            response.field("expires_at").is_some(),
            "Refresh response should contain expiration"
        );
        Ok(())
    })
}

fn auth_status_endpoint(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let client = ctx.authenticated()?;
        let response = client.get(STATUS_ENDPOINT).send().await;

        assert_ok(&response)?;
        ctx.check_contract(&response, "GET", STATUS_ENDPOINT)?;

        let authenticated = response.field("authenticated");
        ensure!(
            authenticated.is_some(),
            "Status should indicate authentication state"
        );
        ensure!(
            authenticated == Some(&Value::Bool(true)),
            "Should be authenticated with valid token"
        );
        Ok(())
    })
}

/// Delivers a signed `event_type` webhook and expects `{success: true}`.
async fn deliver_user_event(ctx: &Context, event_type: &str, data: Value) -> Result<()> {
    let payload = webhook_payload(event_type, data);
    let response = post_webhook(ctx.client(), webhook_headers(), payload).await;

    assert_ok(&response)?;
    ctx.check_contract(&response, "POST", WEBHOOK_ENDPOINT)?;

    ensure!(
        response.field("success").is_some(),
        "Webhook response should indicate success"
    );
    ensure!(
        response.field("success") == Some(&Value::Bool(true)),
        "Webhook processing should succeed"
    );
    Ok(())
}

fn clerk_webhook_user_created(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        deliver_user_event(ctx, "user.created", generate_user_data(None, None)).await
    })
}

fn clerk_webhook_user_updated(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let mut data = generate_user_data(None, None);
        data["updated_at"] = Value::from(unix_now() * 1000);
        deliver_user_event(ctx, "user.updated", data).await
    })
}

fn clerk_webhook_user_deleted(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        deliver_user_event(ctx, "user.deleted", generate_user_data(None, None)).await
    })
}

fn clerk_webhook_invalid_signature(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let headers = vec![
            ("svix-id".to_string(), "msg_invalid".to_string()),
            ("svix-timestamp".to_string(), unix_now().to_string()),
            ("svix-signature".to_string(), "v1,invalid_signature".to_string()),
            ("content-type".to_string(), "application/json".to_string()),
        ];
        let payload = webhook_payload("user.created", generate_user_data(None, None));

        let response = post_webhook(ctx.client(), headers, payload).await;

        assert_error_response(&response, 400, Some("INVALID_WEBHOOK_SIGNATURE"))?;
        ctx.check_contract(&response, "POST", WEBHOOK_ENDPOINT)
    })
}

fn clerk_webhook_missing_headers(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let payload = webhook_payload("user.created", generate_user_data(None, None));

        let response = post_webhook(ctx.client(), Vec::new(), payload).await;

        assert_error_response(&response, 400, Some("MISSING_WEBHOOK_HEADERS"))?;
        ctx.check_contract(&response, "POST", WEBHOOK_ENDPOINT)
    })
}

fn clerk_webhook_unknown_event_type(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let payload = webhook_payload("unknown.event", generate_user_data(None, None));

        let response = post_webhook(ctx.client(), webhook_headers(), payload).await;

        assert_status_in(&response, &[200, 400])?;
        ctx.check_contract(&response, "POST", WEBHOOK_ENDPOINT)
    })
}

fn expired_token_handling(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let token = ctx.token().set("exp", unix_now() - 3600);
        let response = session_with(ctx, &token).await?;

        assert_error_response(&response, 401, Some("TOKEN_EXPIRED"))?;
        ctx.check_contract(&response, "GET", SESSION_ENDPOINT)
    })
}

fn malformed_token_handling(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let response = session_with_raw(ctx, "malformed.token.here").await;

        assert_error_response(&response, 401, Some("INVALID_TOKEN"))?;
        ctx.check_contract(&response, "GET", SESSION_ENDPOINT)
    })
}

fn token_with_wrong_issuer(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let token = ctx.token().set("iss", "https://wrong-issuer.com");
        let response = session_with(ctx, &token).await?;

        assert_error_response(&response, 401, Some("INVALID_ISSUER"))?;
        ctx.check_contract(&response, "GET", SESSION_ENDPOINT)
    })
}

fn token_with_missing_claims(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let token = ctx.token().remove("sub");
        let response = session_with(ctx, &token).await?;

        assert_error_response(&response, 401, Some("INVALID_TOKEN_CLAIMS"))?;
        ctx.check_contract(&response, "GET", SESSION_ENDPOINT)
    })
}

fn organization_member_access(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let token = ctx
            .token()
            .set("org_id", "org_test_123")
            .set("org_role", "member");
        let response = session_with(ctx, &token).await?;

        assert_ok(&response)?;
        ctx.check_contract(&response, "GET", SESSION_ENDPOINT)?;

        if response.field("user").is_some() {
            ensure!(
                user_field(&response, "org_id").is_some() || response.field("organization").is_some(),
                "Should include organization context"
            );
        }
        Ok(())
    })
}

fn organization_admin_privileges(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let token = ctx.token().set("org_role", "admin");
        let response = session_with(ctx, &token).await?;

        assert_ok(&response)?;

        if response.field("user").is_some() {
            let role = user_field(&response, "org_role").and_then(Value::as_str);
            ensure!(
                role == Some("admin") || user_field(&response, "permissions").is_some(),
                "Admin role should be reflected in the session, got {:?}",
                role
            );
        }
        Ok(())
    })
}

fn cross_organization_access_denied(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let token = ctx.token().set("org_id", "org_user_123");
        let response = session_with(ctx, &token).await?;

        assert_ok(&response)?;

        if response.field("user").is_some() {
            let org_id = user_field(&response, "org_id").and_then(Value::as_str);
            ensure!(
                org_id == Some("org_user_123"),
                "Should maintain organization isolation, got {:?}",
                org_id
            );
        }
        Ok(())
    })
}

fn authentication_during_file_processing(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let sample = ctx.fixtures().sample_aktr()?;
        let client = ctx.authenticated()?;
        let api = ctx.extraction(&client);

        let upload = api.upload_file(&sample, None).await?;
        let batch_id = assert_extraction_started(&upload)?;

        for _ in 0..SESSION_CHECKS {
            let session = client.get(SESSION_ENDPOINT).send().await;
            assert_ok(&session)?;

            let results = api.results(&batch_id).await;
            ensure!(
                matches!(results.status_code(), 200 | 404),
                "Should maintain access to batch, got {}",
                results.status_code()
            );

            tokio::time::sleep(SESSION_CHECK_INTERVAL).await;
        }
        Ok(())
    })
}

fn concurrent_authentication_sessions(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let clients = (0..CONCURRENT_SESSIONS)
            .map(|_| ctx.authenticated())
            .collect::<Result<Vec<_>>>()?;

        let responses = join_all(clients.iter().map(|c| c.get(SESSION_ENDPOINT).send())).await;

        for response in &responses {
            assert_ok(response)?;
        }
        Ok(())
    })
}
