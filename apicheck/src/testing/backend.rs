//! In-process HTTP server that imitates the extraction backend.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::auth::{DEFAULT_AUDIENCE, DEFAULT_ISSUER};
use crate::config::TestConfig;

use super::routes;
use super::state::BackendState;

/// Shape of error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorFormat {
    /// `{"error": message, "code": code}`
    #[default]
    Standard,
    /// `{"detail": message}`, with no `error` or `code` key.
    Detail,
}

/// Behaviour knobs for [`MockBackend`].
#[derive(Debug, Clone)]
pub struct MockBackendConfig {
    /// HS256 secret accepted on bearer tokens.
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Extract requests allowed per user per window.
    pub rate_limit: u32,
    pub rate_limit_window: Duration,
    pub max_file_size: u64,
    pub max_files: usize,
    /// Time before a batch reports `completed`.
    pub processing_delay: Duration,
    /// Status reported for an unfinished batch. `None` leaves the field out.
    pub pending_status: Option<String>,
    /// Delay applied before answering any request.
    pub response_delay: Option<Duration>,
    pub error_format: ErrorFormat,
}

impl Default for MockBackendConfig {
    fn default() -> Self {
        Self {
            secret: "test_secret".to_string(),
            issuer: DEFAULT_ISSUER.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            rate_limit: 10,
            rate_limit_window: Duration::from_secs(3600),
            max_file_size: 50 * 1024 * 1024,
            max_files: 30,
            processing_delay: Duration::from_millis(300),
            pending_status: Some("processing".to_string()),
            response_delay: None,
            error_format: ErrorFormat::Standard,
        }
    }
}

impl MockBackendConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits and secret taken from a test configuration.
    pub fn from_config(config: &TestConfig) -> Self {
        Self {
            secret: config.token_secret.clone(),
            rate_limit: config.rate_limit,
            rate_limit_window: config.rate_limit_window,
            max_file_size: config.max_file_size,
            max_files: config.max_files_per_batch,
            ..Self::default()
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    pub fn with_rate_limit(mut self, limit: u32, window: Duration) -> Self {
        self.rate_limit = limit;
        self.rate_limit_window = window;
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }

    pub fn with_processing_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = delay;
        self
    }

    pub fn with_pending_status(mut self, status: Option<&str>) -> Self {
        self.pending_status = status.map(str::to_string);
        self
    }

    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = Some(delay);
        self
    }

    pub fn with_error_format(mut self, format: ErrorFormat) -> Self {
        self.error_format = format;
        self
    }
}

/// A backend double listening on a random local port.
///
/// The server stops when the value is dropped.
///
/// # Examples
///
/// ```no_run
/// use apicheck::client::ApiClient;
/// use apicheck::testing::MockBackend;
/// use std::time::Duration;
///
/// # async fn demo() -> std::io::Result<()> {
/// let backend = MockBackend::start().await?;
/// let client = ApiClient::new(backend.url(), Duration::from_secs(5));
/// let response = client.get("/health").send().await;
/// assert_eq!(response.status_code(), 200);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    _shutdown: oneshot::Sender<()>,
}

impl MockBackend {
    /// Starts a backend with default settings.
    pub async fn start() -> io::Result<Self> {
        Self::with_config(MockBackendConfig::default()).await
    }

    pub async fn with_config(config: MockBackendConfig) -> io::Result<Self> {
        let state = Arc::new(BackendState::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let server_state = state.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let io = TokioIo::new(stream);
                                let state = server_state.clone();

                                tokio::spawn(async move {
                                    let service = service_fn(move |req: Request<Incoming>| {
                                        let state = state.clone();
                                        async move {
                                            Ok::<_, std::convert::Infallible>(routes::handle(req, state).await)
                                        }
                                    });

                                    let _ = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await;
                                });
                            }
                            Err(_) => break,
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
        });

        tracing::debug!(%addr, "mock backend listening");

        Ok(Self {
            addr,
            state,
            _shutdown: shutdown_tx,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> &MockBackendConfig {
        &self.state.config
    }

    /// Requests received so far, on any route.
    pub fn request_count(&self) -> u64 {
        self.state.request_count()
    }

    /// A local test configuration aimed at this backend with matching limits.
    pub fn test_config(&self) -> TestConfig {
        let config = self.config();
        TestConfig::for_backend(self.url())
            .with_token_secret(config.secret.clone())
            .with_rate_limit(config.rate_limit)
            .with_max_file_size(config.max_file_size)
            .with_max_files_per_batch(config.max_files)
    }
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}
