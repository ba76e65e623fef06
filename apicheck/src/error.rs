//! Error handling for the harness.
//!
//! Transport failures are never errors here: the executor turns them into
//! sentinel [`ApiResponse`](crate::client::ApiResponse) values so scenarios can
//! inspect them like any other response. [`Error`] covers everything that
//! should stop a scenario instead: local precondition failures, failed
//! assertions, skips, and configuration problems.
//!
//! # Examples
//!
//! ```
//! use apicheck::error::{Error, ErrorKind};
//!
//! let err = Error::assertion("expected status 200, got 404");
//! assert_eq!(err.kind, ErrorKind::Assertion);
//! assert!(!err.is_skip());
//! ```

use std::fmt;
use std::path::Path;

use crate::config::ConfigError;

/// The category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An HTTP method the executor does not issue.
    UnsupportedMethod,
    /// A local fixture file is missing before any request was made.
    MissingFixture,
    /// A response did not match what the scenario expected.
    Assertion,
    /// The scenario cannot run in this environment.
    Skipped,
    /// Configuration could not be loaded.
    Config,
    /// A token could not be encoded.
    Token,
    /// Local file system failure.
    Io,
}

impl ErrorKind {
    /// Machine-readable name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedMethod => "UNSUPPORTED_METHOD",
            ErrorKind::MissingFixture => "MISSING_FIXTURE",
            ErrorKind::Assertion => "ASSERTION_FAILED",
            ErrorKind::Skipped => "SKIPPED",
            ErrorKind::Config => "CONFIG_ERROR",
            ErrorKind::Token => "TOKEN_ERROR",
            ErrorKind::Io => "IO_ERROR",
        }
    }
}

/// The error type used throughout the harness.
#[derive(Debug, Clone)]
pub struct Error {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Human-readable message, including expected/actual context for assertions.
    pub message: String,
}

impl Error {
    /// Creates a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates an unsupported method error.
    pub fn unsupported_method(method: &str) -> Self {
        Self::new(
            ErrorKind::UnsupportedMethod,
            format!("Unsupported HTTP method: {}", method),
        )
    }

    /// Creates a missing fixture error for the given path.
    pub fn missing_fixture(path: &Path) -> Self {
        Self::new(
            ErrorKind::MissingFixture,
            format!("Test file not found: {}", path.display()),
        )
    }

    /// Creates an assertion failure.
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Assertion, message)
    }

    /// Creates a skip with the given reason.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Skipped, reason)
    }

    /// Creates a token encoding error.
    pub fn token(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Token, message)
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    /// Returns true if this error marks a skipped scenario.
    pub fn is_skip(&self) -> bool {
        self.kind == ErrorKind::Skipped
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::Config, err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Fails the current scenario with an assertion error unless `cond` holds.
///
/// ```
/// use apicheck::ensure;
/// use apicheck::error::Result;
///
/// fn check(status: u16) -> Result<()> {
///     ensure!(status == 200, "expected 200, got {}", status);
///     Ok(())
/// }
///
/// assert!(check(200).is_ok());
/// assert!(check(500).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::Error::assertion(format!($($arg)+)));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_new() {
        let err = Error::new(ErrorKind::Assertion, "boom");
        assert_eq!(err.kind, ErrorKind::Assertion);
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn test_unsupported_method_message() {
        let err = Error::unsupported_method("PATCH");
        assert_eq!(err.kind, ErrorKind::UnsupportedMethod);
        assert_eq!(err.message, "Unsupported HTTP method: PATCH");
    }

    #[test]
    fn test_missing_fixture_message() {
        let err = Error::missing_fixture(Path::new("fixtures/files/valid/a.pdf"));
        assert_eq!(err.kind, ErrorKind::MissingFixture);
        assert!(err.message.contains("fixtures/files/valid/a.pdf"));
    }

    #[test]
    fn test_skip_detection() {
        assert!(Error::skipped("no fixture").is_skip());
        assert!(!Error::assertion("bad").is_skip());
    }

    #[test]
    fn test_display_includes_kind() {
        let err = Error::assertion("expected 200");
        assert_eq!(err.to_string(), "ASSERTION_FAILED: expected 200");
    }

    #[test]
    fn test_from_config_error() {
        let err: Error = ConfigError::Missing("TEST_ENV".to_string()).into();
        assert_eq!(err.kind, ErrorKind::Config);
        assert!(err.message.contains("TEST_ENV"));
    }

    #[test]
    fn test_ensure_macro() {
        fn check(value: u16) -> Result<()> {
            crate::ensure!(value < 10, "value {} too large", value);
            Ok(())
        }

        assert!(check(3).is_ok());
        let err = check(42).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Assertion);
        assert_eq!(err.message, "value 42 too large");
    }
}
