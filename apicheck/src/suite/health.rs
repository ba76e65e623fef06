//! Availability, routing and header checks.

use std::time::Duration;

use serde_json::Value;

use crate::assertions::{assert_response_time_within, assert_status_in};
use crate::auth::{SESSION_ENDPOINT, STATUS_ENDPOINT, WEBHOOK_ENDPOINT};
use crate::client::ApiResponse;
use crate::ensure;
use crate::error::Result;
use crate::extraction::EXTRACT_ENDPOINT;

use super::{BoxFuture, Context, Marker, Scenario};

const MODULE: &str = "health";

const HEALTH_ENDPOINT: &str = "/health";

/// Statuses that show an unauthenticated endpoint is routed.
const REACHABLE_STATUSES: [u16; 5] = [200, 202, 400, 404, 405];

struct Endpoint {
    path: &'static str,
    method: &'static str,
    auth_required: bool,
}

const CORE_ENDPOINTS: [Endpoint; 5] = [
    Endpoint { path: HEALTH_ENDPOINT, method: "GET", auth_required: false },
    Endpoint { path: EXTRACT_ENDPOINT, method: "POST", auth_required: true },
    Endpoint { path: SESSION_ENDPOINT, method: "GET", auth_required: true },
    Endpoint { path: STATUS_ENDPOINT, method: "GET", auth_required: true },
    Endpoint { path: WEBHOOK_ENDPOINT, method: "POST", auth_required: false },
];

const SECURITY_HEADERS: [&str; 4] = [
    "x-content-type-options",
    "x-frame-options",
    "x-xss-protection",
    "strict-transport-security",
];

pub(super) fn scenarios() -> Vec<Scenario> {
    use Marker::*;
    vec![
        Scenario::new("backend_health_check", MODULE, &[Integration, RequiresBackend], backend_health_check),
        Scenario::new("core_endpoints_accessibility", MODULE, &[Integration, RequiresBackend], core_endpoints_accessibility),
        Scenario::new("authenticated_endpoints_with_auth", MODULE, &[Integration, RequiresBackend], authenticated_endpoints_with_auth),
        Scenario::new("cors_headers_present", MODULE, &[Integration, RequiresBackend], cors_headers_present),
        Scenario::new("api_versioning_support", MODULE, &[Integration, RequiresBackend], api_versioning_support),
        Scenario::new("error_response_format_consistency", MODULE, &[Contract, RequiresBackend], error_response_format_consistency),
        Scenario::new("content_type_headers", MODULE, &[Contract, RequiresBackend], content_type_headers),
        Scenario::new("security_headers_present", MODULE, &[Contract, RequiresBackend], security_headers_present),
        Scenario::new("api_response_times", MODULE, &[Slow, Performance, RequiresBackend], api_response_times),
        Scenario::new("environment_detection", MODULE, &[Integration, RequiresBackend], environment_detection),
        Scenario::new("api_base_url_configuration", MODULE, &[Integration, RequiresBackend], api_base_url_configuration),
    ]
}

/// A JSON body with at least one field.
fn has_json_fields(response: &ApiResponse) -> bool {
    match response.json_body() {
        Some(Value::Object(map)) => !map.is_empty(),
        _ => false,
    }
}

fn backend_health_check(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let response = ctx
            .monitor()
            .measure("backend_health_check", ctx.client().get(HEALTH_ENDPOINT).send())
            .await?;

        assert_response_time_within(&response, Duration::from_secs(1))?;
        assert_status_in(&response, &[200, 204])?;

        if has_json_fields(&response) {
            let status = response.str_field("status");
            ensure!(
                matches!(status, Some("healthy" | "ok" | "up")),
                "Health status indicates problem: {:?}",
                response.data()
            );
        }
        Ok(())
    })
}

fn core_endpoints_accessibility(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        for endpoint in &CORE_ENDPOINTS {
            let response = ctx
                .client()
                .request(endpoint.method, endpoint.path)?
                .send()
                .await;

            tracing::info!(
                endpoint = %format!("{} {}", endpoint.method, endpoint.path),
                status = response.status_code(),
                duration_ms = response.duration().as_millis() as u64,
                "accessibility"
            );

            if endpoint.auth_required {
                ensure!(
                    response.status_code() == 401,
                    "Endpoint {} {} not accessible. Expected status 401, got {}",
                    endpoint.method,
                    endpoint.path,
                    response.status_code()
                );
            } else {
                ensure!(
                    REACHABLE_STATUSES.contains(&response.status_code()),
                    "Endpoint {} {} not accessible. Expected status {:?}, got {}",
                    endpoint.method,
                    endpoint.path,
                    REACHABLE_STATUSES,
                    response.status_code()
                );
            }
        }
        Ok(())
    })
}

fn authenticated_endpoints_with_auth(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let client = ctx.authenticated()?;

        for endpoint in CORE_ENDPOINTS.iter().filter(|e| e.auth_required) {
            let name = format!("auth_{}_{}", endpoint.method.to_lowercase(), endpoint.path.replace('/', "_"));
            let response = ctx
                .monitor()
                .measure(&name, client.request(endpoint.method, endpoint.path)?.send())
                .await?;

            ensure!(
                response.status_code() != 401,
                "Authentication failed for {} {}. Got {}: {:?}",
                endpoint.method,
                endpoint.path,
                response.status_code(),
                response.data()
            );
        }
        Ok(())
    })
}

fn cors_headers_present(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let response = ctx
            .client()
            .options(EXTRACT_ENDPOINT)
            .header("Origin", "http://localhost:3000")
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "Authorization,Content-Type")
            .send()
            .await;

        assert_status_in(&response, &[200, 204, 405])?;

        if matches!(response.status_code(), 200 | 204) {
            let found = [
                "access-control-allow-origin",
                "access-control-allow-methods",
                "access-control-allow-headers",
            ]
            .iter()
            .filter(|h| response.header(h).is_some())
            .count();
            ensure!(
                found > 0,
                "Expected CORS headers not found. Headers: {:?}",
                response.headers()
            );
        }
        Ok(())
    })
}

fn api_versioning_support(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let v1 = ctx.client().get(STATUS_ENDPOINT).send().await;
        ensure!(
            v1.status_code() != 404,
            "API v1 endpoints not found - versioning may not be configured"
        );

        let v999 = ctx.client().get("/api/v999/auth/status").send().await;
        ensure!(
            v999.status_code() == 404,
            "Expected 404 for non-existent API version, got {}",
            v999.status_code()
        );
        Ok(())
    })
}

fn error_response_format_consistency(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let authenticated = ctx.authenticated()?;
        let cases = [
            ("Unauthorized endpoint", ctx.client().get(SESSION_ENDPOINT), 401),
            ("Not found endpoint", authenticated.get("/api/v1/nonexistent"), 404),
            ("Invalid method", authenticated.put(SESSION_ENDPOINT), 405),
        ];

        let mut first_has_error: Option<bool> = None;
        for (name, request, expected) in cases {
            let response = request.send().await;
            ensure!(
                response.status_code() == expected,
                "Test case '{}' returned {}, expected {}",
                name,
                response.status_code(),
                expected
            );

            if has_json_fields(&response) {
                let has_error = response.has_error_field();
                match first_has_error {
                    None => first_has_error = Some(has_error),
                    Some(first) => ensure!(
                        first == has_error,
                        "Inconsistent error response format for '{}': {:?}",
                        name,
                        response.data()
                    ),
                }
            }
        }
        Ok(())
    })
}

fn content_type_headers(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let client = ctx.authenticated()?;

        for path in [SESSION_ENDPOINT, HEALTH_ENDPOINT] {
            let response = client.get(path).send().await;
            if response.status_code() >= 500 {
                continue;
            }
            let content_type = response.header("content-type").unwrap_or_default();
            ensure!(
                content_type.to_lowercase().contains("application/json"),
                "Endpoint GET {} returned Content-Type '{}', expected to contain 'application/json'",
                path,
                content_type
            );
        }
        Ok(())
    })
}

/// Reports which security headers are present; never fails on absence.
fn security_headers_present(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let response = ctx.client().get(HEALTH_ENDPOINT).send().await;
        let present: Vec<&str> = SECURITY_HEADERS
            .iter()
            .copied()
            .filter(|h| response.header(h).is_some())
            .collect();

        tracing::info!(found = ?present, headers = ?response.headers().keys().collect::<Vec<_>>(), "security headers");
        Ok(())
    })
}

fn api_response_times(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let authenticated = ctx.authenticated()?;
        let cases = [
            (HEALTH_ENDPOINT, ctx.client(), Duration::from_secs(1)),
            (SESSION_ENDPOINT, &authenticated, Duration::from_secs(2)),
            (STATUS_ENDPOINT, &authenticated, Duration::from_secs(2)),
        ];

        for (path, client, max) in cases {
            let name = format!("perf_get_{}", path.replace('/', "_"));
            let response = ctx.monitor().measure(&name, client.get(path).send()).await?;

            tracing::info!(
                endpoint = path,
                duration_ms = response.duration().as_millis() as u64,
                max_ms = max.as_millis() as u64,
                "response time"
            );

            if response.status_code() < 500 {
                ensure!(
                    response.duration() <= max,
                    "Performance requirement not met for GET {}. Took {:.3}s, max allowed {}s",
                    path,
                    response.duration_secs(),
                    max.as_secs_f64()
                );
            }
        }
        Ok(())
    })
}

fn environment_detection(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let response = ctx.client().get(HEALTH_ENDPOINT).send().await;

        if response.status_code() == 200 {
            tracing::info!(
                environment = %ctx.config().environment,
                backend = %ctx.config().backend_base_url,
                health = ?response.data(),
                "backend environment"
            );
        }

        ensure!(
            matches!(response.status_code(), 200 | 204),
            "Backend health check failed: {}",
            response.status_code()
        );
        Ok(())
    })
}

fn api_base_url_configuration(ctx: &Context) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        let response = ctx.client().get(HEALTH_ENDPOINT).send().await;
        let base_url = &ctx.config().backend_base_url;

        ensure!(
            response.status_code() != 503,
            "Cannot connect to backend at {}. Check if backend is running and URL is correct.",
            base_url
        );
        ensure!(
            !matches!(response.status_code(), 404 | 502),
            "Backend API base URL may be incorrect: {}. Got {}",
            base_url,
            response.status_code()
        );
        Ok(())
    })
}
