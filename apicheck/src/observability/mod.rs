//! Logging for harness runs.
//!
//! The executor, checks and runner emit `tracing` events; this module only
//! installs the subscriber that prints them.

mod tracing;

pub use self::tracing::LogConfig;
