use std::sync::Arc;

use crate::assertions::assert_contract_compliance;
use crate::auth::MockToken;
use crate::client::{ApiClient, ApiResponse};
use crate::config::TestConfig;
use crate::database::MockDatabase;
use crate::error::Result;
use crate::extraction::ExtractionApi;
use crate::fixtures::Fixtures;
use crate::openapi::{ContractValidator, ResponseValidator};
use crate::performance::PerformanceMonitor;

/// Everything a scenario needs, shared across a run.
pub struct Context {
    config: Arc<TestConfig>,
    client: ApiClient,
    validator: Arc<dyn ResponseValidator>,
    fixtures: Fixtures,
    monitor: PerformanceMonitor,
    database: MockDatabase,
}

impl Context {
    pub fn new(config: Arc<TestConfig>) -> Self {
        let validator = Arc::new(ContractValidator::new(&config.contract_path));
        Self {
            client: ApiClient::from_config(&config),
            fixtures: Fixtures::new(&config.fixtures_dir),
            validator,
            monitor: PerformanceMonitor::default(),
            database: MockDatabase::new(),
            config,
        }
    }

    /// Replaces the contract validator.
    pub fn with_validator(mut self, validator: Arc<dyn ResponseValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Client without credentials.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Default claims for the session's test user.
    pub fn token(&self) -> MockToken {
        MockToken::new()
    }

    /// Client authenticated with `token` signed by the configured secret.
    pub fn client_with(&self, token: &MockToken) -> Result<ApiClient> {
        let encoded = token.encode(&self.config.token_secret)?;
        Ok(self.client.with_bearer(&encoded))
    }

    /// Client authenticated with the default token.
    pub fn authenticated(&self) -> Result<ApiClient> {
        self.client_with(&self.token())
    }

    pub fn extraction<'a>(&self, client: &'a ApiClient) -> ExtractionApi<'a> {
        ExtractionApi::new(client)
    }

    pub fn validator(&self) -> &dyn ResponseValidator {
        self.validator.as_ref()
    }

    /// Fails when the response contradicts the contract document.
    pub fn check_contract(&self, response: &ApiResponse, method: &str, path: &str) -> Result<()> {
        assert_contract_compliance(self.validator(), response, method, path)
    }

    pub fn fixtures(&self) -> &Fixtures {
        &self.fixtures
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn database(&self) -> &MockDatabase {
        &self.database
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("environment", &self.config.environment)
            .field("backend", &self.config.backend_base_url)
            .finish_non_exhaustive()
    }
}
