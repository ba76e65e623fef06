//! Implementation of the scenario-running commands (`health`, `contract`,
//! `auth`, `security`, `all` and `run`).

use std::sync::Arc;
use std::time::Duration;

use apicheck::config::{Environment, TestConfig};
use apicheck::suite::{self, Context, Marker, Outcome, Report, Runner, ScenarioResult, Selection};
use colored::Colorize;

use super::colors;

/// Which scenarios a command runs.
#[derive(Debug, Clone)]
pub enum Mode {
    /// Availability check followed by the basic health scenario.
    Health,
    Contract,
    /// Auth and Clerk integration scenarios.
    Auth,
    /// Security scenarios. Not run against production.
    Security,
    /// Everything, minus slow scenarios unless asked for.
    All { slow: bool },
    /// Explicit marker and name selection.
    Custom(Selection),
}

impl Mode {
    /// The selection for `environment`, or `None` when the mode does not run there.
    pub fn selection(&self, environment: Environment) -> Option<Selection> {
        let selection = match self {
            Mode::Health => Selection::new().filter("health::backend_health_check"),
            Mode::Contract => Selection::new().include(Marker::Contract),
            Mode::Auth => Selection::new()
                .include(Marker::Auth)
                .include(Marker::ClerkIntegration),
            Mode::Security => {
                if environment.is_production() {
                    return None;
                }
                Selection::new().include(Marker::Security)
            }
            Mode::All { slow } => {
                let mut selection = Selection::new();
                if !slow {
                    selection = selection.exclude(Marker::Slow);
                }
                if environment.is_production() {
                    selection = selection.exclude(Marker::RateLimit);
                }
                selection
            }
            Mode::Custom(selection) => selection.clone(),
        };
        Some(selection)
    }

    fn label(&self) -> &'static str {
        match self {
            Mode::Health => "health check",
            Mode::Contract => "contract tests",
            Mode::Auth => "authentication tests",
            Mode::Security => "security tests",
            Mode::All { .. } => "all tests",
            Mode::Custom(_) => "selected tests",
        }
    }
}

/// Options shared by the scenario-running commands.
pub struct RunConfig {
    pub environment: Environment,
    pub mode: Mode,
}

/// Runs the scenarios for `config.mode`. Returns whether the run passed.
pub fn execute(config: RunConfig) -> Result<bool, String> {
    let test_config = TestConfig::load(config.environment).map_err(|e| e.to_string())?;

    print_header(&test_config, &config.mode);

    let Some(selection) = config.mode.selection(config.environment) else {
        println!(
            "  {} {} are not run against {}",
            "SKIP".custom_color(colors::yellow()).bold(),
            config.mode.label(),
            config.environment.to_string().custom_color(colors::sky())
        );
        return Ok(true);
    };

    let scenarios = selection.apply(suite::all());
    if scenarios.is_empty() {
        println!(
            "  {} No scenarios match the selection",
            "WARN".custom_color(colors::yellow()).bold()
        );
        return Ok(true);
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start async runtime: {}", e))?;

    runtime.block_on(async {
        let context = Context::new(Arc::new(test_config));
        let mut runner = Runner::new();

        if matches!(config.mode, Mode::Health) {
            let available = suite::backend_available(context.client()).await;
            if !available && config.environment == Environment::Local {
                return Err(format!(
                    "Backend is not available at {}",
                    context.config().backend_base_url
                ));
            }
            runner = runner.assume_backend(available);
        }

        println!(
            "  {} {} scenario(s)",
            "Running".custom_color(colors::blue()).bold(),
            scenarios.len()
        );
        println!();

        let report = runner.run_with(&context, &scenarios, print_result).await;
        print_summary(&report);
        Ok(report.is_success())
    })
}

fn print_header(config: &TestConfig, mode: &Mode) {
    println!();
    println!(
        "  {} {}",
        "apicheck".custom_color(colors::mauve()).bold(),
        mode.label()
    );
    println!(
        "  {} {}",
        "Environment:".custom_color(colors::subtext()),
        config.environment.as_str().custom_color(colors::sky())
    );
    println!(
        "  {} {}",
        "Backend:    ".custom_color(colors::subtext()),
        config.backend_base_url.custom_color(colors::sky())
    );
    println!();
}

fn print_result(result: &ScenarioResult) {
    let elapsed = format_duration(result.duration).custom_color(colors::subtext());
    match &result.outcome {
        Outcome::Passed => println!(
            "  {} {} {}",
            "PASS".custom_color(colors::green()).bold(),
            result.name,
            elapsed
        ),
        Outcome::Failed(message) => {
            println!(
                "  {} {} {}",
                "FAIL".custom_color(colors::red()).bold(),
                result.name,
                elapsed
            );
            println!("       {}", message.custom_color(colors::red()));
        }
        Outcome::Skipped(reason) => println!(
            "  {} {} {}",
            "SKIP".custom_color(colors::yellow()).bold(),
            result.name,
            format!("({})", reason).custom_color(colors::subtext())
        ),
    }
}

fn print_summary(report: &Report) {
    println!();
    let failed = if report.failed() > 0 {
        format!("{} failed", report.failed())
            .custom_color(colors::red())
            .bold()
    } else {
        "0 failed".custom_color(colors::subtext()).normal()
    };
    println!(
        "  {}, {}, {} in {}",
        format!("{} passed", report.passed())
            .custom_color(colors::green())
            .bold(),
        failed,
        format!("{} skipped", report.skipped()).custom_color(colors::yellow()),
        format_duration(report.duration)
    );

    if !report.is_success() {
        println!();
        println!("  {}", "Failures:".custom_color(colors::red()).bold());
        for failure in report.failures() {
            println!("    {} {}", "-".custom_color(colors::red()), failure.name);
        }
    }
    println!();
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
