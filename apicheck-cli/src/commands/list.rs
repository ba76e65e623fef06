//! Implementation of the `apicheck list` command.

use apicheck::suite::{self, Marker};
use colored::Colorize;

use super::colors;

/// Prints every marker and every registered scenario.
pub fn execute() -> Result<(), String> {
    println!();
    println!("  {}", "Markers".custom_color(colors::mauve()).bold());
    for marker in Marker::ALL {
        println!(
            "    {:<20} {}",
            marker.as_str().custom_color(colors::sky()),
            marker.description().custom_color(colors::subtext())
        );
    }

    let scenarios = suite::all();
    let mut module = "";
    for scenario in &scenarios {
        if scenario.module != module {
            module = scenario.module;
            println!();
            println!("  {}", module.custom_color(colors::mauve()).bold());
        }
        let markers: Vec<&str> = scenario.markers.iter().map(Marker::as_str).collect();
        println!(
            "    {:<45} {}",
            scenario.name,
            format!("[{}]", markers.join(", ")).custom_color(colors::subtext())
        );
    }

    println!();
    println!(
        "  {} scenario(s)",
        scenarios.len().to_string().custom_color(colors::green()).bold()
    );
    println!();
    Ok(())
}
