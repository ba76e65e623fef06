use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

/// Configuration for harness log output.
///
/// `RUST_LOG` takes precedence over [`LogConfig::level`] when set.
///
/// # Examples
///
/// ```
/// use apicheck::observability::LogConfig;
/// use tracing::Level;
///
/// LogConfig::new().level(Level::DEBUG).init();
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output logs as JSON.
    pub json: bool,
    /// The minimum log level.
    pub level: Level,
    /// Include the target (module path) in logs.
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: Level::WARN,
            with_target: false,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables JSON output format.
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Sets the minimum log level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Level used for a `--verbose` flag.
    pub fn verbose(self, verbose: bool) -> Self {
        if verbose {
            self.level(Level::DEBUG)
        } else {
            self
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.to_string()))
    }

    /// Installs the global subscriber.
    ///
    /// Returns false if a subscriber was already installed; the existing one
    /// is kept.
    pub fn init(self) -> bool {
        let filter = self.filter();
        let builder = fmt()
            .with_env_filter(filter)
            .with_target(self.with_target)
            .with_writer(std::io::stderr);

        if self.json {
            builder.json().try_init().is_ok()
        } else {
            builder.try_init().is_ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(!config.json);
        assert_eq!(config.level, Level::WARN);
        assert!(!config.with_target);
    }

    #[test]
    fn test_log_config_verbose() {
        assert_eq!(LogConfig::new().verbose(true).level, Level::DEBUG);
        assert_eq!(LogConfig::new().verbose(false).level, Level::WARN);
    }

    #[test]
    fn test_log_config_builder_chain() {
        let config = LogConfig::new()
            .json()
            .level(Level::TRACE)
            .with_target(true);

        assert!(config.json);
        assert_eq!(config.level, Level::TRACE);
        assert!(config.with_target);
    }

    #[test]
    fn test_init_twice_keeps_first() {
        LogConfig::new().init();
        assert!(!LogConfig::new().json().init());
    }
}
