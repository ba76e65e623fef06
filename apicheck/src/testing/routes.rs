use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, ALLOW, AUTHORIZATION, CONTENT_TYPE, ORIGIN, RETRY_AFTER,
};
use http::{HeaderMap, HeaderValue, Method, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper::body::Incoming;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::auth::{
    REFRESH_ENDPOINT, SESSION_ENDPOINT, STATUS_ENDPOINT, TEST_SIGNATURE, WEBHOOK_ENDPOINT,
};
use crate::extraction::{
    EXTRACT_ENDPOINT, MALICIOUS_EXTENSIONS, RESULTS_ENDPOINT, SAFE_EXTENSIONS, VALID_FILE_TYPES,
};

use super::{ErrorFormat, MockBackendConfig};
use super::multipart::{self, FormPart};
use super::state::{BackendState, Batch};

type MockResponse = Response<Full<Bytes>>;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Authorization, Content-Type";
const WEBHOOK_HEADERS: [&str; 3] = ["svix-id", "svix-timestamp", "svix-signature"];
const USER_EVENTS: [&str; 3] = ["user.created", "user.updated", "user.deleted"];
const REFRESHED_TOKEN_LIFETIME: u64 = 3600;

/// Bearer token claims. Claims the backend does not read are carried in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    org_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    org_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iat: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Claims {
    fn subject(&self) -> Option<&str> {
        self.sub.as_deref()
    }
}

enum Route {
    Health,
    Robots,
    Session,
    Refresh,
    Status,
    Webhook,
    Extract,
    Results(String),
}

impl Route {
    fn resolve(path: &str) -> Option<Self> {
        match path {
            "/health" => Some(Route::Health),
            "/robots.txt" => Some(Route::Robots),
            SESSION_ENDPOINT => Some(Route::Session),
            REFRESH_ENDPOINT => Some(Route::Refresh),
            STATUS_ENDPOINT => Some(Route::Status),
            WEBHOOK_ENDPOINT => Some(Route::Webhook),
            EXTRACT_ENDPOINT => Some(Route::Extract),
            _ => path
                .strip_prefix(RESULTS_ENDPOINT)
                .and_then(|rest| rest.strip_prefix('/'))
                .filter(|id| !id.is_empty() && !id.contains('/'))
                .map(|id| Route::Results(id.to_string())),
        }
    }

    fn method(&self) -> Method {
        match self {
            Route::Refresh | Route::Webhook | Route::Extract => Method::POST,
            _ => Method::GET,
        }
    }

    fn allow(&self) -> &'static str {
        if self.method() == Method::POST {
            "POST, OPTIONS"
        } else {
            "GET, OPTIONS"
        }
    }
}

pub(super) async fn handle(req: Request<Incoming>, state: Arc<BackendState>) -> MockResponse {
    state.record_request();
    if let Some(delay) = state.config.response_delay {
        tokio::time::sleep(delay).await;
    }

    let origin = req.headers().get(ORIGIN).cloned();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = dispatch(req, &state).await;
    if state.config.error_format == ErrorFormat::Detail {
        response = into_detail(response).await;
    }
    apply_common_headers(response.headers_mut(), origin);

    tracing::trace!(%method, path = %path, status = response.status().as_u16(), "mock backend");
    response
}

async fn dispatch(req: Request<Incoming>, state: &BackendState) -> MockResponse {
    if req.method() == Method::OPTIONS {
        return preflight();
    }

    let Some(route) = Route::resolve(req.uri().path()) else {
        return error(StatusCode::NOT_FOUND, "Not found", "NOT_FOUND");
    };

    if req.method() != route.method() {
        let mut response = error(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed",
            "METHOD_NOT_ALLOWED",
        );
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static(route.allow()));
        return response;
    }

    match route {
        Route::Health => health(),
        Route::Robots => text(StatusCode::OK, "User-agent: *\nDisallow: /api/\n"),
        Route::Session => session(req.headers(), &state.config),
        Route::Refresh => refresh(req.headers(), &state.config),
        Route::Status => status(req.headers(), &state.config),
        Route::Webhook => webhook(req).await,
        Route::Extract => extract(req, state).await,
        Route::Results(batch_id) => results(req.headers(), state, &batch_id),
    }
}

fn json_response(status: StatusCode, body: Value) -> MockResponse {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn text(status: StatusCode, body: &'static str) -> MockResponse {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

fn error(status: StatusCode, message: impl Into<String>, code: &str) -> MockResponse {
    json_response(status, json!({ "error": message.into(), "code": code }))
}

/// Rewrites a `{"error": message, ..}` body as `{"detail": message}`.
async fn into_detail(response: MockResponse) -> MockResponse {
    let (parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    };

    let body = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(mut map)) => match map.remove("error") {
            Some(message) => Bytes::from(json!({ "detail": message }).to_string()),
            None => bytes,
        },
        _ => bytes,
    };
    Response::from_parts(parts, Full::new(body))
}

fn apply_common_headers(headers: &mut HeaderMap, origin: Option<HeaderValue>) {
    headers.insert(
        ACCESS_CONTROL_ALLOW_ORIGIN,
        origin.unwrap_or_else(|| HeaderValue::from_static("*")),
    );
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("x-xss-protection", HeaderValue::from_static("1; mode=block"));
}

fn preflight() -> MockResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
    response
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn health() -> MockResponse {
    json_response(
        StatusCode::OK,
        json!({ "status": "healthy", "environment": "test", "timestamp": unix_now() }),
    )
}

/// Verifies the bearer token, mapping each failure to its error code.
fn authenticate(
    headers: &HeaderMap,
    config: &MockBackendConfig,
) -> Result<Claims, MockResponse> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return Err(error(
            StatusCode::UNAUTHORIZED,
            "Authentication required",
            "UNAUTHORIZED",
        ));
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[config.issuer.as_str()]);
    validation.set_audience(&[config.audience.as_str()]);
    validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

    let key = DecodingKey::from_secret(config.secret.as_bytes());
    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            let (message, code) = match e.kind() {
                JwtErrorKind::ExpiredSignature => ("Token has expired", "TOKEN_EXPIRED"),
                JwtErrorKind::InvalidIssuer => ("Invalid token issuer", "INVALID_ISSUER"),
                JwtErrorKind::MissingRequiredClaim(_) => {
                    ("Token is missing required claims", "INVALID_TOKEN_CLAIMS")
                }
                _ => ("Invalid token", "INVALID_TOKEN"),
            };
            tracing::debug!(error = %e, code, "token rejected");
            error(StatusCode::UNAUTHORIZED, message, code)
        })
}

fn session(headers: &HeaderMap, config: &MockBackendConfig) -> MockResponse {
    let claims = match authenticate(headers, config) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let organization = match &claims.org_id {
        Some(id) => json!({ "id": id, "role": claims.org_role }),
        None => Value::Null,
    };

    json_response(
        StatusCode::OK,
        json!({
            "user": {
                "id": claims.subject(),
                "email": claims.email,
                "org_id": claims.org_id,
                "org_role": claims.org_role,
            },
            "session": {
                "id": format!("sess_{}", uuid::Uuid::new_v4().simple()),
                "expires_at": claims.exp,
            },
            "organization": organization,
        }),
    )
}

fn refresh(headers: &HeaderMap, config: &MockBackendConfig) -> MockResponse {
    let mut claims = match authenticate(headers, config) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let now = unix_now();
    let expires_at = now + REFRESHED_TOKEN_LIFETIME;
    claims.iat = Some(now);
    claims.exp = Some(expires_at);

    let key = EncodingKey::from_secret(config.secret.as_bytes());
    match encode(&Header::new(Algorithm::HS256), &claims, &key) {
        Ok(token) => json_response(
            StatusCode::OK,
            json!({ "token": token, "expires_at": expires_at }),
        ),
        Err(e) => error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Token refresh failed: {}", e),
            "INTERNAL_ERROR",
        ),
    }
}

fn status(headers: &HeaderMap, config: &MockBackendConfig) -> MockResponse {
    match authenticate(headers, config) {
        Ok(claims) => json_response(
            StatusCode::OK,
            json!({ "authenticated": true, "user_id": claims.subject() }),
        ),
        Err(response) => response,
    }
}

async fn read_body(req: Request<Incoming>) -> Result<Bytes, MockResponse> {
    req.into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| {
            error(
                StatusCode::BAD_REQUEST,
                format!("Failed to read request body: {}", e),
                "INVALID_REQUEST",
            )
        })
}

async fn webhook(req: Request<Incoming>) -> MockResponse {
    let headers = req.headers();
    if WEBHOOK_HEADERS.iter().any(|name| !headers.contains_key(*name)) {
        return error(
            StatusCode::BAD_REQUEST,
            "Missing webhook signature headers",
            "MISSING_WEBHOOK_HEADERS",
        );
    }

    let signature = headers
        .get("svix-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if signature != TEST_SIGNATURE {
        return error(
            StatusCode::BAD_REQUEST,
            "Invalid webhook signature",
            "INVALID_WEBHOOK_SIGNATURE",
        );
    }

    let body = match read_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        return error(StatusCode::BAD_REQUEST, "Invalid webhook payload", "INVALID_PAYLOAD");
    };

    let event_type = payload.get("type").and_then(Value::as_str).unwrap_or_default();
    if USER_EVENTS.contains(&event_type) {
        json_response(
            StatusCode::OK,
            json!({ "success": true, "event_type": event_type }),
        )
    } else {
        json_response(
            StatusCode::OK,
            json!({ "success": true, "ignored": true, "event_type": event_type }),
        )
    }
}

/// Strips any directory components a client put in the file name.
fn sanitize_file_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn extension(name: &str) -> String {
    name.rfind('.')
        .map(|i| name[i..].to_ascii_lowercase())
        .unwrap_or_default()
}

fn is_allowed_file(name: &str, part: &FormPart) -> bool {
    let ext = extension(name);
    if MALICIOUS_EXTENSIONS.contains(&ext.as_str()) || !SAFE_EXTENSIONS.contains(&ext.as_str()) {
        return false;
    }

    let mime = part
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    if !VALID_FILE_TYPES.contains(&mime) {
        return false;
    }

    mime != "application/pdf" || part.data.starts_with(b"%PDF")
}

async fn extract(req: Request<Incoming>, state: &BackendState) -> MockResponse {
    let config = &state.config;
    let claims = match authenticate(req.headers(), config) {
        Ok(claims) => claims,
        Err(response) => return response,
    };
    let user = claims.subject().unwrap_or_default().to_string();

    if let Some(retry_after) = state.check_rate_limit(&user) {
        let mut response = error(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded: too many extraction requests",
            "RATE_LIMIT_EXCEEDED",
        );
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(retry_after));
        return response;
    }

    let boundary = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(multipart::boundary);

    let body = match read_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let parts = match boundary {
        Some(boundary) => multipart::parse(body, &boundary).await,
        None => Vec::new(),
    };
    let files: Vec<FormPart> = parts
        .into_iter()
        .filter(|part| part.name == "files" && part.file_name.is_some())
        .collect();

    if files.is_empty() {
        return error(StatusCode::BAD_REQUEST, "No files provided", "NO_FILES_PROVIDED");
    }
    if files.len() > config.max_files {
        return error(
            StatusCode::BAD_REQUEST,
            format!("Too many files: at most {} per request", config.max_files),
            "TOO_MANY_FILES",
        );
    }

    let mut names = Vec::with_capacity(files.len());
    for part in &files {
        let name = sanitize_file_name(part.file_name.as_deref().unwrap_or_default());
        if part.data.len() as u64 > config.max_file_size {
            return error(
                StatusCode::BAD_REQUEST,
                format!("File too large: {} exceeds {} bytes", name, config.max_file_size),
                "FILE_TOO_LARGE",
            );
        }
        if !is_allowed_file(&name, part) {
            return error(
                StatusCode::BAD_REQUEST,
                format!("Invalid file type: {} is not allowed", name),
                "INVALID_FILE_TYPE",
            );
        }
        names.push(name);
    }

    let batch = state.create_batch(&user, names);
    tracing::debug!(batch_id = %batch.id, files = batch.files.len(), "batch accepted");

    json_response(
        StatusCode::ACCEPTED,
        json!({
            "batch_id": batch.id,
            "status": "processing",
            "estimated_completion": state.estimated_completion(),
            "files_count": batch.files.len(),
            "files": batch.files,
        }),
    )
}

fn results(headers: &HeaderMap, state: &BackendState, batch_id: &str) -> MockResponse {
    let claims = match authenticate(headers, &state.config) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let batch = state
        .batch(batch_id)
        .filter(|batch| Some(batch.owner.as_str()) == claims.subject());
    let Some(batch) = batch else {
        return error(
            StatusCode::NOT_FOUND,
            format!("Batch {} not found", batch_id),
            "BATCH_NOT_FOUND",
        );
    };

    if !state.is_complete(&batch) {
        return json_response(
            StatusCode::OK,
            pending_batch(&batch, state.config.pending_status.as_deref()),
        );
    }

    let results: Vec<Value> = batch
        .files
        .iter()
        .map(|name| {
            json!({
                "file_name": name,
                "status": "extracted",
                "document_type": "AKTR",
                "acs_codes": [],
            })
        })
        .collect();

    json_response(
        StatusCode::OK,
        json!({
            "batch_id": batch.id,
            "status": "completed",
            "files_count": batch.files.len(),
            "results": results,
        }),
    )
}

fn pending_batch(batch: &Batch, status: Option<&str>) -> Value {
    let mut body = json!({
        "batch_id": batch.id,
        "files_count": batch.files.len(),
    });
    if let Some(status) = status {
        body["status"] = status.into();
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_routes() {
        assert!(matches!(Route::resolve("/health"), Some(Route::Health)));
        assert!(matches!(Route::resolve(EXTRACT_ENDPOINT), Some(Route::Extract)));
        assert!(matches!(
            Route::resolve("/api/v1/extractor/results/batch_1"),
            Some(Route::Results(id)) if id == "batch_1"
        ));
        assert!(Route::resolve("/api/v1/extractor/results/").is_none());
        assert!(Route::resolve("/api/v999/auth/status").is_none());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../malicious.pdf"), "malicious.pdf");
        assert_eq!(sanitize_file_name("..\\evil.pdf"), "evil.pdf");
        assert_eq!(sanitize_file_name("plain.pdf"), "plain.pdf");
    }

    fn part(content_type: &str, data: &'static [u8]) -> FormPart {
        FormPart {
            name: "files".to_string(),
            file_name: None,
            content_type: Some(content_type.to_string()),
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn test_file_type_checks() {
        assert!(is_allowed_file("a.pdf", &part("application/pdf", b"%PDF-1.4")));
        assert!(is_allowed_file("a.PNG", &part("image/png", b"\x89PNG")));
        assert!(!is_allowed_file("a.exe", &part("application/pdf", b"%PDF-1.4")));
        assert!(!is_allowed_file("a.pdf", &part("application/x-msdownload", b"%PDF")));
        assert!(!is_allowed_file("a.pdf", &part("application/pdf", b"<script>")));
        assert!(!is_allowed_file("noext", &part("application/pdf", b"%PDF")));
    }

    #[test]
    fn test_pending_batch_status() {
        let batch = Batch {
            id: "batch_1".to_string(),
            owner: "user_1".to_string(),
            files: vec!["a.pdf".to_string()],
            created: std::time::Instant::now(),
        };
        assert_eq!(pending_batch(&batch, Some("queued"))["status"], "queued");
        assert_eq!(pending_batch(&batch, Some("queued"))["files_count"], 1);
        assert!(pending_batch(&batch, None).get("status").is_none());
    }

    #[test]
    fn test_claims_keep_unread_fields() {
        let claims: Claims = serde_json::from_value(json!({
            "sub": "user_1",
            "exp": 10,
            "iss": "issuer",
            "aud": "audience",
        }))
        .unwrap();
        assert_eq!(claims.subject(), Some("user_1"));
        assert!(claims.org_id.is_none());

        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["iss"], "issuer");
        assert_eq!(value["aud"], "audience");
        assert!(value.get("org_id").is_none());
    }

    #[test]
    fn test_claims_without_subject() {
        let claims: Claims = serde_json::from_value(json!({ "exp": 10 })).unwrap();
        assert!(claims.subject().is_none());
    }
}
