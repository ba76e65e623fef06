//! Implementation of the `apicheck install-deps` command.

use std::process::Command;

use colored::Colorize;

use super::colors;

/// Fetches the workspace dependencies with cargo.
///
/// With `force`, the lockfile is refreshed with `cargo update` first.
pub fn execute(force: bool) -> Result<(), String> {
    if force {
        run_cargo(&["update"], "Updating dependencies")?;
    }
    run_cargo(&["fetch"], "Fetching dependencies")?;

    println!(
        "{} Dependencies installed",
        "SUCCESS".custom_color(colors::green()).bold()
    );
    Ok(())
}

fn run_cargo(args: &[&str], action: &str) -> Result<(), String> {
    println!(
        "{} {}...",
        "INFO".custom_color(colors::blue()).bold(),
        action
    );

    let status = Command::new("cargo")
        .args(args)
        .status()
        .map_err(|e| format!("Failed to run cargo: {}", e))?;

    if !status.success() {
        return Err(format!("cargo {} exited with {}", args.join(" "), status));
    }
    Ok(())
}
