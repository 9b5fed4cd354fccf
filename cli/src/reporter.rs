//! User-facing terminal output
//!
//! Diagnostics (`tracing`) and what the user reads are kept apart: this
//! module owns the latter and always writes to stderr so stdout stays free
//! for machine-readable output.

use std::sync::{Arc, Mutex};

use colored::Colorize;

use crate::utils::is_ci;

/// Prints pipeline progress for a human or a CI log
#[derive(Debug, Clone)]
pub struct Reporter {
    ci: bool,
    quiet: bool,
    captured: Option<Arc<Mutex<Vec<String>>>>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    pub fn new() -> Self {
        Self {
            ci: is_ci(),
            quiet: false,
            captured: None,
        }
    }

    /// A reporter that prints nothing
    pub fn quiet() -> Self {
        Self {
            ci: false,
            quiet: true,
            captured: None,
        }
    }

    /// A reporter that keeps lines in memory instead of printing them.
    /// Clones share the same buffer.
    pub fn capturing() -> Self {
        Self {
            ci: false,
            quiet: true,
            captured: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    /// Lines recorded by a capturing reporter
    pub fn captured(&self) -> Vec<String> {
        self.captured
            .as_ref()
            .and_then(|lines| lines.lock().ok().map(|lines| lines.clone()))
            .unwrap_or_default()
    }

    pub fn is_ci(&self) -> bool {
        self.ci
    }

    fn print(&self, line: String) {
        if let Some(captured) = &self.captured {
            if let Ok(mut lines) = captured.lock() {
                lines.push(line);
            }
        } else if !self.quiet {
            eprintln!("{}", line);
        }
    }

    pub fn intro(&self, title: &str) {
        self.print(format!("{} {}", "┌".dimmed(), title.bold()));
    }

    pub fn step(&self, message: &str) {
        self.print(format!("{} {}", "◇".green(), message));
    }

    pub fn message(&self, message: &str) {
        self.print(format!("{} {}", "│".dimmed(), message));
    }

    pub fn success(&self, message: &str) {
        self.print(format!("{} {}", "◆".green(), message));
    }

    pub fn warn(&self, message: &str) {
        self.print(format!("{} {}", "▲".yellow(), message.yellow()));
    }

    pub fn error(&self, message: &str) {
        self.print(format!("{} {}", "■".red(), message));
    }

    pub fn outro(&self, message: &str) {
        self.print(format!("{} {}", "└".dimmed(), message));
    }

    /// Outro prefixed with a red label, e.g. `Error: ...`
    pub fn outro_error(&self, prefix: &str, message: &str) {
        self.outro(&format!("{} {}", format!("{}:", prefix).red().bold(), message));
    }

    /// Print a remote error payload verbatim
    pub fn pretty_error(&self, message: &str, stack: Option<&str>, stderr: Option<&str>) {
        self.print(format!("{} {}", "Error:".red().bold(), message));
        if let Some(stack) = stack.filter(|s| !s.trim().is_empty()) {
            self.print(stack.dimmed().to_string());
        }
        if let Some(stderr) = stderr.filter(|s| !s.trim().is_empty()) {
            self.print(String::new());
            self.print(stderr.to_string());
        }
    }

    pub fn print_warnings(&self, warnings: &[String]) {
        for warning in warnings {
            self.warn(warning);
        }
    }

    pub fn print_errors(&self, errors: &[String]) {
        for error in errors {
            self.error(&error.red().to_string());
        }
    }
}
