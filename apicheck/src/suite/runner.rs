use std::time::{Duration, Instant};

use crate::client::ApiClient;
use crate::config::Environment;

use super::{Context, Marker, Scenario};

/// Timeout for the availability check.
const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

/// How a scenario ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    Skipped(String),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// One executed (or skipped) scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: String,
    pub outcome: Outcome,
    pub duration: Duration,
}

/// Results of a run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub results: Vec<ScenarioResult>,
    pub duration: Duration,
}

impl Report {
    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::is_failure)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    /// True when nothing failed. Skips do not count against a run.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| r.outcome.is_failure())
    }

    fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

/// `GET /health` answers 200 within a few seconds.
pub async fn backend_available(client: &ApiClient) -> bool {
    let response = client.get("/health").timeout(AVAILABILITY_TIMEOUT).send().await;
    response.status_code() == 200
}

/// Runs scenarios one after another.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    check_backend: Option<bool>,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the backend availability check done before a local run.
    pub fn assume_backend(mut self, available: bool) -> Self {
        self.check_backend = Some(available);
        self
    }

    pub async fn run(&self, context: &Context, scenarios: &[Scenario]) -> Report {
        self.run_with(context, scenarios, |_| {}).await
    }

    /// Runs `scenarios`, calling `on_result` after each one.
    pub async fn run_with<F>(&self, context: &Context, scenarios: &[Scenario], mut on_result: F) -> Report
    where
        F: FnMut(&ScenarioResult),
    {
        let environment = context.config().environment;
        let started = Instant::now();

        let backend_down = environment == Environment::Local
            && scenarios.iter().any(|s| s.has(Marker::RequiresBackend))
            && !match self.check_backend {
                Some(available) => available,
                None => backend_available(context.client()).await,
            };
        if backend_down {
            tracing::warn!(
                backend = %context.config().backend_base_url,
                "backend not available, skipping scenarios that need it"
            );
        }

        let mut report = Report::default();
        for scenario in scenarios {
            let skip_reason = if environment.is_production() && scenario.has(Marker::RateLimit) {
                Some("Rate limit tests skipped in production")
            } else if backend_down && scenario.has(Marker::RequiresBackend) {
                Some("Backend server not available")
            } else {
                None
            };

            let result = match skip_reason {
                Some(reason) => ScenarioResult {
                    name: scenario.full_name(),
                    outcome: Outcome::Skipped(reason.to_string()),
                    duration: Duration::ZERO,
                },
                None => execute(context, scenario).await,
            };

            on_result(&result);
            report.results.push(result);
        }

        report.duration = started.elapsed();
        tracing::info!(
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            duration_ms = report.duration.as_millis() as u64,
            "run finished"
        );
        report
    }
}

async fn execute(context: &Context, scenario: &Scenario) -> ScenarioResult {
    let name = scenario.full_name();
    tracing::debug!(scenario = %name, "running");

    let start = Instant::now();
    let result = (scenario.run)(context).await;
    let duration = start.elapsed();

    let outcome = match result {
        Ok(()) => Outcome::Passed,
        Err(e) if e.is_skip() => Outcome::Skipped(e.message),
        Err(e) => {
            tracing::debug!(scenario = %name, kind = e.kind.as_str(), "scenario failed");
            Outcome::Failed(e.to_string())
        }
    };

    ScenarioResult {
        name,
        outcome,
        duration,
    }
}
