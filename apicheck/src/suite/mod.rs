//! Scenario suite.
//!
//! Every check against the backend is a [`Scenario`]: a named async function
//! of a [`Context`] tagged with [`Marker`]s. [`Selection`] picks scenarios by
//! marker or name and [`Runner`] executes them in order.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use apicheck::config::TestConfig;
//! use apicheck::suite::{self, Context, Marker, Runner, Selection};
//!
//! # async fn demo() {
//! let context = Context::new(Arc::new(TestConfig::for_backend("http://localhost:8000")));
//! let scenarios = Selection::new().include(Marker::Auth).apply(suite::all());
//! let report = Runner::new().run(&context, &scenarios).await;
//! println!("{} passed, {} failed", report.passed(), report.failed());
//! # }
//! ```

mod authentication;
mod context;
mod file_extraction;
mod health;
mod runner;
mod selection;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

pub use context::Context;
pub use runner::{Outcome, Report, Runner, ScenarioResult, backend_available};
pub use selection::Selection;

use crate::error::Result;

/// A boxed future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Signature of a scenario body.
pub type ScenarioFn = for<'a> fn(&'a Context) -> BoxFuture<'a, Result<()>>;

/// Tags used to select scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Integration,
    Contract,
    Auth,
    ClerkIntegration,
    Security,
    RateLimit,
    Slow,
    RequiresBackend,
    Performance,
    Unit,
    RequiresDatabase,
}

impl Marker {
    pub const ALL: [Marker; 11] = [
        Marker::Integration,
        Marker::Contract,
        Marker::Auth,
        Marker::ClerkIntegration,
        Marker::Security,
        Marker::RateLimit,
        Marker::Slow,
        Marker::RequiresBackend,
        Marker::Performance,
        Marker::Unit,
        Marker::RequiresDatabase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Marker::Integration => "integration",
            Marker::Contract => "contract",
            Marker::Auth => "auth",
            Marker::ClerkIntegration => "clerk_integration",
            Marker::Security => "security",
            Marker::RateLimit => "rate_limit",
            Marker::Slow => "slow",
            Marker::RequiresBackend => "requires_backend",
            Marker::Performance => "performance",
            Marker::Unit => "unit",
            Marker::RequiresDatabase => "requires_database",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Marker::Integration => "End-to-end checks against a running backend",
            Marker::Contract => "Responses checked against the API contract",
            Marker::Auth => "Token handling and access control",
            Marker::ClerkIntegration => "Clerk session and webhook handling",
            Marker::Security => "Malicious upload and injection handling",
            Marker::RateLimit => "Rate limiting (skipped in production)",
            Marker::Slow => "Takes several seconds or more",
            Marker::RequiresBackend => "Needs the backend to be reachable",
            Marker::Performance => "Response time requirements",
            Marker::Unit => "No network access",
            Marker::RequiresDatabase => "Needs a database connection",
        }
    }
}

impl FromStr for Marker {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Marker::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown marker '{}'", s))
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named check against the backend.
#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    /// Group the scenario belongs to, e.g. `authentication`.
    pub module: &'static str,
    pub markers: &'static [Marker],
    pub run: ScenarioFn,
}

impl Scenario {
    pub const fn new(
        name: &'static str,
        module: &'static str,
        markers: &'static [Marker],
        run: ScenarioFn,
    ) -> Self {
        Self {
            name,
            module,
            markers,
            run,
        }
    }

    pub fn has(&self, marker: Marker) -> bool {
        self.markers.contains(&marker)
    }

    /// `module::name`.
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.module, self.name)
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("markers", &self.markers)
            .finish()
    }
}

/// Every registered scenario, grouped by module.
pub fn all() -> Vec<Scenario> {
    let mut scenarios = health::scenarios();
    scenarios.extend(file_extraction::scenarios());
    scenarios.extend(authentication::scenarios());
    scenarios
}

/// Looks up a scenario by `name` or `module::name`.
pub fn find(name: &str) -> Option<Scenario> {
    all()
        .into_iter()
        .find(|s| s.name == name || s.full_name() == name)
}
