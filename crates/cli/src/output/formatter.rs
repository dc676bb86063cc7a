//! Output formatter for human-readable output
//!
//! Ensures consistent output formatting across both benchmarks.

use super::OutputConfig;

/// Formatter for CLI output
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    /// Create a new formatter with the given configuration
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> OutputConfig {
        self.config
    }

    /// Check if verbose diagnostics are enabled
    pub fn is_verbose(&self) -> bool {
        self.config.verbose
    }

    /// Check if colors are enabled
    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color
    }

    /// Print a summary line
    pub fn println(&self, message: &str) {
        println!("{message}");
    }

    /// Print a diagnostic line when `--verbose` is set
    pub fn verbose(&self, message: &str) {
        if self.config.verbose {
            println!("{message}");
        }
    }

    /// Output an error message
    pub fn error(&self, message: &str) {
        if self.colors_enabled() {
            eprintln!("\x1b[31m✗\x1b[0m {message}");
        } else {
            eprintln!("✗ {message}");
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}
