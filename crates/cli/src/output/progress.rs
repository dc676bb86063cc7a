//! Progress bar for transfer benchmarks
//!
//! Off unless `--progress` is given, so drawing never competes with the
//! transfer being measured.

use gb_core::ProgressSink;
use humansize::{BINARY, format_size};

use super::OutputConfig;

/// Progress bar wrapper
#[derive(Debug)]
pub struct ProgressBar {
    bar: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    /// Create a new progress bar with the given total size in bytes
    pub fn new(config: OutputConfig, total: u64) -> Self {
        let bar = if config.progress {
            let bar = indicatif::ProgressBar::new(total);
            if let Ok(style) = indicatif::ProgressStyle::default_bar().template(
                "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({binary_bytes_per_sec})",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }
            Some(bar)
        } else {
            None
        };

        Self { bar }
    }

    /// Increment progress
    pub fn inc(&self, delta: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(delta);
        }
    }

    /// Finish and report how much was moved
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(format!(
                "{} transferred",
                format_size(bar.position(), BINARY)
            ));
        }
    }

    /// Finish and clear the progress bar
    pub fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    /// Check if progress bar is visible
    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }

    /// Bytes counted so far
    pub fn position(&self) -> u64 {
        self.bar.as_ref().map_or(0, indicatif::ProgressBar::position)
    }
}

impl ProgressSink for ProgressBar {
    fn advance(&self, bytes: u64) {
        self.inc(bytes);
    }
}
