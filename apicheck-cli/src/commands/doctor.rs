//! Implementation of the `apicheck doctor` command.

use apicheck::client::ApiClient;
use apicheck::config::{Environment, TestConfig};
use apicheck::database::DatabaseConfig;
use apicheck::fixtures::Fixtures;
use apicheck::openapi::ContractDocument;
use apicheck::suite;
use colored::Colorize;

use super::colors;

#[derive(Default)]
struct Tally {
    errors: usize,
    warnings: usize,
}

impl Tally {
    fn ok(&self, message: &str) {
        println!("  {} {}", "✓".custom_color(colors::green()), message);
    }

    fn warn(&mut self, message: &str) {
        self.warnings += 1;
        println!("  {} {}", "!".custom_color(colors::yellow()).bold(), message);
    }

    fn error(&mut self, message: &str) {
        self.errors += 1;
        println!("  {} {}", "✗".custom_color(colors::red()).bold(), message);
    }
}

/// Verifies the local setup for `environment`.
pub fn execute(environment: Environment) -> Result<(), String> {
    println!();
    println!(
        "  {} {}",
        "apicheck doctor".custom_color(colors::mauve()).bold(),
        format!("({})", environment).custom_color(colors::subtext())
    );
    println!();

    let mut tally = Tally::default();

    let config = match TestConfig::load(environment) {
        Ok(config) => {
            tally.ok(&format!("Configuration loaded for {}", environment));
            config
        }
        Err(e) => {
            tally.error(&format!("Configuration: {}", e));
            return Err("Setup verification failed".to_string());
        }
    };

    check_credentials(&config, &mut tally);
    check_fixtures(&config, &mut tally);
    check_contract(&config, &mut tally);
    check_database(&config, &mut tally);
    check_backend(&config, &mut tally)?;

    println!();
    if tally.errors > 0 {
        return Err(format!(
            "{} error(s), {} warning(s)",
            tally.errors, tally.warnings
        ));
    }
    if tally.warnings > 0 {
        println!(
            "  {} {} warning(s)",
            "Done".custom_color(colors::yellow()).bold(),
            tally.warnings
        );
    } else {
        println!(
            "  {} Setup looks good",
            "Done".custom_color(colors::green()).bold()
        );
    }
    println!();
    Ok(())
}

fn check_credentials(config: &TestConfig, tally: &mut Tally) {
    if config.clerk_secret_key.is_some() {
        tally.ok("Clerk secret key configured");
    } else {
        tally.warn("INTEGRATION_CLERK_SECRET_KEY not set, using mock tokens only");
    }
}

fn check_fixtures(config: &TestConfig, tally: &mut Tally) {
    let fixtures = Fixtures::new(&config.fixtures_dir);
    match fixtures.valid_pdfs() {
        Ok(pdfs) => tally.ok(&format!(
            "{} valid PDF fixture(s) in {}",
            pdfs.len(),
            fixtures.root().display()
        )),
        Err(e) => tally.warn(&e.message),
    }

    for check in [fixtures.sample_aktr(), fixtures.malicious_exe(), fixtures.script_injection()] {
        if let Err(e) = check {
            tally.warn(&e.message);
        }
    }
}

fn check_contract(config: &TestConfig, tally: &mut Tally) {
    let path = config.contract_path.display();
    match ContractDocument::load(&config.contract_path) {
        ContractDocument::Spec(_) => tally.ok(&format!("Contract document loaded from {}", path)),
        ContractDocument::Empty => tally.warn(&format!(
            "No contract document at {}, contract checks are permissive",
            path
        )),
        ContractDocument::Unreadable(e) => {
            tally.error(&format!("Contract document {} is unreadable: {}", path, e))
        }
    }
}

fn check_database(config: &TestConfig, tally: &mut Tally) {
    let database = DatabaseConfig::from_config(config);
    match database.effective_url() {
        Some(_) if database.use_test_database && database.test_database_url.is_some() => {
            tally.ok("Test database configured")
        }
        Some(_) => tally.ok("Database configured"),
        None => tally.warn("No database URL configured, database scenarios use the mock"),
    }
}

fn check_backend(config: &TestConfig, tally: &mut Tally) -> Result<(), String> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start async runtime: {}", e))?;
    let client = ApiClient::from_config(config);

    if runtime.block_on(suite::backend_available(&client)) {
        tally.ok(&format!("Backend reachable at {}", config.backend_base_url));
    } else if config.environment == Environment::Local {
        tally.error(&format!(
            "Backend not reachable at {}",
            config.backend_base_url
        ));
    } else {
        tally.warn(&format!(
            "Backend not reachable at {}",
            config.backend_base_url
        ));
    }
    Ok(())
}
