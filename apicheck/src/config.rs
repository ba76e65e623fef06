//! Type-safe configuration loading from environment variables.
//!
//! The suite is configured once per session. [`TestConfig::load`] reads the
//! per-environment `.env.integration.<env>` file (if present), then the
//! `INTEGRATION_*` variables, falling back to the environment's profile
//! defaults. The resulting value is immutable and shared as `Arc<TestConfig>`.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Load the `.env.integration.<env>` file from the working directory if it exists.
///
/// Variables already present in the process environment are not overridden.
/// Returns the path that was loaded, if any.
pub fn load_dotenv(environment: Environment) -> Option<PathBuf> {
    load_dotenv_from(Path::new("."), environment)
}

/// Like [`load_dotenv`], but looks for the file in `dir`.
pub fn load_dotenv_from(dir: &Path, environment: Environment) -> Option<PathBuf> {
    let path = dir.join(format!(".env.integration.{}", environment.as_str()));
    if !path.exists() {
        return None;
    }
    match dotenvy::from_path(&path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "loaded environment file");
            Some(path)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to load environment file");
            None
        }
    }
}

/// Get a required environment variable.
///
/// Returns an error if the variable is not set.
pub fn get_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))
}

/// Get an optional environment with a default value
pub fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an optional environment variable, treating empty values as unset.
pub fn get_env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get and parse an environment variable.
pub fn get_env_parsed<T: FromStr>(key: &str) -> Result<T, ConfigError> {
    let value = get_env(key)?;
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value,
    })
}

/// Get and parse an environment variable with a default.
///
/// Unparsable values fall back to the default silently.
pub fn get_env_parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Get and parse an environment variable with a default.
///
/// Unlike [`get_env_parsed_or`], a value that is set but cannot be parsed is
/// reported as [`ConfigError::Invalid`].
pub fn try_get_env_parsed_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match get_env_opt(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

/// Configuration loading errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Environment variable is not set.
    Missing(String),
    /// Environment variable value is invalid.
    Invalid { key: String, value: String },
    /// Unknown test environment name.
    UnknownEnvironment(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => {
                write!(f, "Missing required environment variable '{}'", key)
            }
            ConfigError::Invalid { key, value } => {
                write!(
                    f,
                    "Invalid value '{}' for environment variable '{}' (failed to parse as expected type)",
                    value, key
                )
            }
            ConfigError::UnknownEnvironment(name) => {
                write!(
                    f,
                    "Unknown test environment '{}' (expected local, staging or production)",
                    name
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// The backend deployment a session runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Static per-environment defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentProfile {
    pub backend_url: &'static str,
    pub frontend_url: &'static str,
    pub description: &'static str,
}

const LOCAL_PROFILE: EnvironmentProfile = EnvironmentProfile {
    backend_url: "http://localhost:8000",
    frontend_url: "http://localhost:3000",
    description: "Local development backend",
};

const STAGING_PROFILE: EnvironmentProfile = EnvironmentProfile {
    backend_url: "https://cfipros-api-staging.up.railway.app/api/v1",
    frontend_url: "https://staging.cfipros.com",
    description: "Staging environment on Railway",
};

const PRODUCTION_PROFILE: EnvironmentProfile = EnvironmentProfile {
    backend_url: "https://api.cfipros.com/api/v1",
    frontend_url: "https://cfipros.com",
    description: "Production environment (read-only tests)",
};

impl Environment {
    /// All environments in display order.
    pub const ALL: [Environment; 3] = [
        Environment::Local,
        Environment::Staging,
        Environment::Production,
    ];

    /// Reads `TEST_ENV`, defaulting to [`Environment::Local`].
    pub fn from_env() -> Result<Self, ConfigError> {
        match get_env_opt("TEST_ENV") {
            Some(name) => name.parse(),
            None => Ok(Environment::Local),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// The profile holding this environment's default URLs.
    pub fn profile(&self) -> &'static EnvironmentProfile {
        match self {
            Environment::Local => &LOCAL_PROFILE,
            Environment::Staging => &STAGING_PROFILE,
            Environment::Production => &PRODUCTION_PROFILE,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            _ => Err(ConfigError::UnknownEnvironment(s.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session-wide configuration for the integration suite.
///
/// Environment variables (all optional):
///
/// ```bash
/// TEST_ENV=local                          # local | staging | production
/// INTEGRATION_BACKEND_BASE_URL=http://localhost:8000
/// INTEGRATION_FRONTEND_BASE_URL=http://localhost:3000
/// INTEGRATION_CLERK_SECRET_KEY=sk_test_...
/// INTEGRATION_CLERK_PUBLISHABLE_KEY=pk_test_...
/// INTEGRATION_TEST_USER_ID=user_...
/// INTEGRATION_TEST_USER_EMAIL=test@cfipros-testing.com
/// INTEGRATION_API_TIMEOUT=30              # seconds
/// INTEGRATION_RATE_LIMIT_WINDOW=3600      # seconds
/// INTEGRATION_RATE_LIMIT=10               # requests per window
/// INTEGRATION_MAX_FILES_PER_BATCH=30
/// INTEGRATION_MAX_FILE_SIZE=52428800      # bytes
/// INTEGRATION_DATABASE_URL=postgres://...
/// INTEGRATION_TEST_DATABASE_URL=postgres://...
/// INTEGRATION_TOKEN_SECRET=test_secret
/// INTEGRATION_FIXTURES_DIR=fixtures/files
/// INTEGRATION_CONTRACT_PATH=api-contracts/openapi.yaml
/// ```
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub environment: Environment,
    pub backend_base_url: String,
    pub frontend_base_url: String,
    pub clerk_secret_key: Option<String>,
    pub clerk_publishable_key: Option<String>,
    pub test_user_id: Option<String>,
    pub test_user_email: String,
    pub api_timeout: Duration,
    pub rate_limit_window: Duration,
    /// Requests allowed per rate-limit window on the extract endpoint.
    pub rate_limit: u32,
    pub max_files_per_batch: usize,
    /// Upload size limit in bytes.
    pub max_file_size: u64,
    pub database_url: Option<String>,
    pub test_database_url: Option<String>,
    /// Symmetric secret used to sign mock tokens.
    pub token_secret: String,
    pub fixtures_dir: PathBuf,
    pub contract_path: PathBuf,
}

impl TestConfig {
    /// Creates a configuration with the profile defaults of `environment`.
    pub fn new(environment: Environment) -> Self {
        let profile = environment.profile();
        Self {
            environment,
            backend_base_url: profile.backend_url.to_string(),
            frontend_base_url: profile.frontend_url.to_string(),
            clerk_secret_key: None,
            clerk_publishable_key: None,
            test_user_id: None,
            test_user_email: "test@cfipros-testing.com".to_string(),
            api_timeout: Duration::from_secs(30),
            rate_limit_window: Duration::from_secs(3600),
            rate_limit: 10,
            max_files_per_batch: 30,
            max_file_size: 50 * 1024 * 1024,
            database_url: None,
            test_database_url: None,
            token_secret: "test_secret".to_string(),
            fixtures_dir: PathBuf::from("fixtures/files"),
            contract_path: PathBuf::from("api-contracts/openapi.yaml"),
        }
    }

    /// Local defaults pointed at the given backend.
    pub fn for_backend(base_url: impl Into<String>) -> Self {
        Self {
            backend_base_url: base_url.into(),
            ..Self::new(Environment::Local)
        }
    }

    /// Resolves `TEST_ENV`, loads its dotenv file, then reads the variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::from_env()?;
        Self::load(environment)
    }

    /// Loads the dotenv file for `environment`, then reads the variables.
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        load_dotenv(environment);
        Self::from_env_for(environment)
    }

    /// Reads `INTEGRATION_*` variables on top of the profile defaults.
    pub fn from_env_for(environment: Environment) -> Result<Self, ConfigError> {
        let defaults = Self::new(environment);

        let api_timeout = try_get_env_parsed_or(
            "INTEGRATION_API_TIMEOUT",
            defaults.api_timeout.as_secs(),
        )?;
        let rate_limit_window = try_get_env_parsed_or(
            "INTEGRATION_RATE_LIMIT_WINDOW",
            defaults.rate_limit_window.as_secs(),
        )?;

        Ok(Self {
            environment,
            backend_base_url: get_env_opt("INTEGRATION_BACKEND_BASE_URL")
                .unwrap_or(defaults.backend_base_url),
            frontend_base_url: get_env_opt("INTEGRATION_FRONTEND_BASE_URL")
                .unwrap_or(defaults.frontend_base_url),
            clerk_secret_key: get_env_opt("INTEGRATION_CLERK_SECRET_KEY"),
            clerk_publishable_key: get_env_opt("INTEGRATION_CLERK_PUBLISHABLE_KEY"),
            test_user_id: get_env_opt("INTEGRATION_TEST_USER_ID"),
            test_user_email: get_env_opt("INTEGRATION_TEST_USER_EMAIL")
                .unwrap_or(defaults.test_user_email),
            api_timeout: Duration::from_secs(api_timeout),
            rate_limit_window: Duration::from_secs(rate_limit_window),
            rate_limit: try_get_env_parsed_or("INTEGRATION_RATE_LIMIT", defaults.rate_limit)?,
            max_files_per_batch: try_get_env_parsed_or(
                "INTEGRATION_MAX_FILES_PER_BATCH",
                defaults.max_files_per_batch,
            )?,
            max_file_size: try_get_env_parsed_or(
                "INTEGRATION_MAX_FILE_SIZE",
                defaults.max_file_size,
            )?,
            database_url: get_env_opt("INTEGRATION_DATABASE_URL"),
            test_database_url: get_env_opt("INTEGRATION_TEST_DATABASE_URL"),
            token_secret: get_env_opt("INTEGRATION_TOKEN_SECRET")
                .unwrap_or(defaults.token_secret),
            fixtures_dir: get_env_opt("INTEGRATION_FIXTURES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.fixtures_dir),
            contract_path: get_env_opt("INTEGRATION_CONTRACT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.contract_path),
        })
    }

    pub fn with_fixtures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixtures_dir = dir.into();
        self
    }

    pub fn with_contract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.contract_path = path.into();
        self
    }

    pub fn with_api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = limit;
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_max_files_per_batch(mut self, count: usize) -> Self {
        self.max_files_per_batch = count;
        self
    }

    pub fn with_token_secret(mut self, secret: impl Into<String>) -> Self {
        self.token_secret = secret.into();
        self
    }
}
