//! apicheck CLI - runs the backend integration suite.

mod commands;

use apicheck::config::Environment;
use apicheck::observability::LogConfig;
use apicheck::suite::{Marker, Selection};
use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::run::{Mode, RunConfig};

/// Exit code used when interrupted with Ctrl+C.
const INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "apicheck")]
#[command(author, version, about = "Integration test runner for the backend API", long_about = None)]
struct Cli {
    /// Environment to test against (local, staging, production)
    #[arg(long, global = true, env = "TEST_ENV", default_value = "local")]
    env: Environment,
    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Display version information
    Version,
    /// Check that the backend is up and healthy
    Health,
    /// Run API contract tests
    Contract,
    /// Run authentication and Clerk integration tests
    Auth,
    /// Run security tests (not run against production)
    Security,
    /// Run the whole suite
    All {
        /// Include slow tests
        #[arg(long)]
        slow: bool,
        /// Exclude slow tests even when --slow is given
        #[arg(long)]
        no_slow: bool,
    },
    /// Run scenarios selected by marker and name
    Run {
        /// Only run scenarios with this marker (repeatable)
        #[arg(short = 'm', long = "marker")]
        include: Vec<Marker>,
        /// Skip scenarios with this marker (repeatable)
        #[arg(short = 'x', long = "exclude")]
        exclude: Vec<Marker>,
        /// Only run scenarios whose name contains this text
        filter: Option<String>,
    },
    /// List markers and scenarios
    List,
    /// Fetch the workspace dependencies
    InstallDeps {
        /// Update the lockfile before fetching
        #[arg(long)]
        force: bool,
    },
    /// Verify the local test setup
    Doctor,
}

fn main() {
    let cli = Cli::parse();

    let mut logging = LogConfig::new()
        .verbose(cli.verbose)
        .with_target(cli.verbose);
    if cli.json_logs {
        logging = logging.json();
    }
    logging.init();

    if let Err(e) = ctrlc::set_handler(|| {
        eprintln!();
        eprintln!("{}", "Interrupted".yellow().bold());
        std::process::exit(INTERRUPTED);
    }) {
        tracing::warn!(error = %e, "failed to set Ctrl+C handler");
    }

    let environment = cli.env;
    let command = cli.command.unwrap_or(Commands::All {
        slow: false,
        no_slow: false,
    });

    let result = match command {
        Commands::Version => {
            print_version();
            Ok(true)
        }
        Commands::Health => run(environment, Mode::Health),
        Commands::Contract => run(environment, Mode::Contract),
        Commands::Auth => run(environment, Mode::Auth),
        Commands::Security => run(environment, Mode::Security),
        Commands::All { slow, no_slow } => run(
            environment,
            Mode::All {
                slow: slow && !no_slow,
            },
        ),
        Commands::Run {
            include,
            exclude,
            filter,
        } => {
            let mut selection = Selection::new();
            for marker in include {
                selection = selection.include(marker);
            }
            for marker in exclude {
                selection = selection.exclude(marker);
            }
            if let Some(filter) = filter {
                selection = selection.filter(filter);
            }
            run(environment, Mode::Custom(selection))
        }
        Commands::List => commands::list::execute().map(|_| true),
        Commands::InstallDeps { force } => commands::install::execute(force).map(|_| true),
        Commands::Doctor => commands::doctor::execute(environment).map(|_| true),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run(environment: Environment, mode: Mode) -> Result<bool, String> {
    commands::run::execute(RunConfig { environment, mode })
}

fn print_version() {
    println!("apicheck {}", env!("CARGO_PKG_VERSION"));
}
