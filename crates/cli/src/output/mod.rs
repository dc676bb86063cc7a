//! Output formatting utilities
//!
//! Benchmark summaries and verbose diagnostics go to stdout; errors,
//! warnings and the optional progress bar go to stderr.

mod formatter;
mod progress;

pub use formatter::Formatter;
pub use progress::ProgressBar;

/// Output configuration derived from CLI flags
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Disable colored output
    pub no_color: bool,
    /// Print per-page or per-run diagnostic lines
    pub verbose: bool,
    /// Show a transfer progress bar
    pub progress: bool,
}
