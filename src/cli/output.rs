//! Terminal rendering for the commons-server commands.

use owo_colors::OwoColorize;
use serde_json::Value;
use std::fmt::Display;

/// Prints command results, with or without ANSI colors.
pub struct Output {
    colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Startup summary for `serve`.
    pub fn banner(&self, app_name: &str, environment: impl Display, address: &str) {
        let version = concat!("v", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!("\n   {} {}", app_name.bright_cyan().bold(), version.dimmed());
            println!("   {} {}", "environment".dimmed(), environment);
            println!("   {} http://{}\n", "listening".dimmed(), address);
        } else {
            println!("\n   {app_name} {version}");
            println!("   environment {environment}");
            println!("   listening http://{address}\n");
        }
    }

    pub fn section(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bold().underline());
        } else {
            println!("\n  [{title}]");
        }
    }

    /// A configuration value or token attribute.
    pub fn field(&self, name: &str, value: impl Display) {
        if self.colored {
            println!("    {:<22} {}", name.dimmed(), value);
        } else {
            println!("    {name:<22} {value}");
        }
    }

    pub fn claim(&self, name: &str, value: &Value) {
        let rendered = claim_text(value);
        if self.colored {
            println!("    {} = {}", name.cyan(), rendered);
        } else {
            println!("    {name} = {rendered}");
        }
    }

    /// An encoded token, alone on its line so it can be copied.
    pub fn token(&self, label: &str, token: &str) {
        self.section(label);
        println!("{token}");
    }

    pub fn valid(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  OK {message}");
        }
    }

    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "!".yellow().bold(), message.yellow());
        } else {
            println!("  WARNING {message}");
        }
    }

    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  ERROR {message}");
        }
    }
}

/// Strings print without quotes, arrays as a comma-separated list, other
/// values as JSON.
fn claim_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(claim_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}
