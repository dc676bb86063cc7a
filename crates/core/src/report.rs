//! Timing and throughput reporting
//!
//! Timings use the monotonic clock, so wall-clock adjustments during a run
//! cannot skew a result.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::job::Direction;
use crate::plan::MIB;
use crate::traits::{BackendKind, TransferMode};

/// What a result counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Bytes,
    Objects,
}

/// Outcome of one benchmark run, computed once at the end
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkResult {
    pub unit: Unit,
    pub total_units: u64,
    pub elapsed: Duration,
    /// Units per second
    pub rate: f64,
}

impl BenchmarkResult {
    pub fn new(unit: Unit, total_units: u64, elapsed: Duration) -> Self {
        Self {
            unit,
            total_units,
            elapsed,
            rate: rate(total_units, elapsed),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Rate in MiB/s (meaningful for byte results)
    pub fn rate_mib(&self) -> f64 {
        self.rate / MIB as f64
    }
}

/// `units / elapsed`, or zero when nothing was counted or no time passed
pub fn rate(units: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if units == 0 || secs == 0.0 {
        0.0
    } else {
        units as f64 / secs
    }
}

/// Monotonic start mark
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Run `fut` and return its output with the time it took
pub async fn measure<F, T>(fut: F) -> (T, Duration)
where
    F: Future<Output = T>,
{
    let watch = Stopwatch::start();
    let output = fut.await;
    (output, watch.elapsed())
}

/// Summary line for a transfer benchmark
pub fn transfer_summary(
    kind: BackendKind,
    mode: TransferMode,
    direction: Direction,
    result: &BenchmarkResult,
) -> String {
    format!(
        "{kind} {mode} {direction}: Took {:.2} seconds. Average throughput: {:.2} MiB/s",
        result.elapsed_secs(),
        result.rate_mib()
    )
}

/// Summary line for a listing benchmark
pub fn listing_summary(result: &BenchmarkResult) -> String {
    format!(
        "Listed {} objects in {:.2}s with a list object throughput of {} objects/s",
        group_thousands(result.total_units),
        result.elapsed_secs(),
        group_thousands(result.rate.round() as u64)
    )
}

/// Format `n` with comma thousands separators
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_zero_units() {
        assert_eq!(rate(0, Duration::from_secs(3)), 0.0);
        assert_eq!(rate(0, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_rate_zero_elapsed() {
        assert_eq!(rate(10, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_rate() {
        assert_eq!(rate(100, Duration::from_secs(4)), 25.0);
        let result = BenchmarkResult::new(Unit::Bytes, 100 * MIB, Duration::from_secs(4));
        assert_eq!(result.rate_mib(), 25.0);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(25000), "25,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_listing_summary() {
        let result = BenchmarkResult::new(Unit::Objects, 25_000, Duration::from_millis(2500));
        insta::assert_snapshot!(
            listing_summary(&result),
            @"Listed 25,000 objects in 2.50s with a list object throughput of 10,000 objects/s"
        );
    }

    #[test]
    fn test_listing_summary_empty() {
        let result = BenchmarkResult::new(Unit::Objects, 0, Duration::from_millis(120));
        insta::assert_snapshot!(
            listing_summary(&result),
            @"Listed 0 objects in 0.12s with a list object throughput of 0 objects/s"
        );
    }

    #[test]
    fn test_transfer_summary() {
        let result = BenchmarkResult::new(Unit::Bytes, 100 * MIB, Duration::from_secs(4));
        insta::assert_snapshot!(
            transfer_summary(BackendKind::Sdk, TransferMode::Chunked, Direction::Upload, &result),
            @"sdk chunked upload: Took 4.00 seconds. Average throughput: 25.00 MiB/s"
        );
    }

    #[tokio::test]
    async fn test_measure_returns_output() {
        let (value, elapsed) = measure(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            7
        })
        .await;
        assert_eq!(value, 7);
        assert!(elapsed >= Duration::from_millis(5));
    }
}
