//! Exit code definitions for gcs-bench
//!
//! Scripts driving benchmark sweeps rely on these values. Keep them stable.

use gb_core::Error;

/// Exit codes for the gcs-bench application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Benchmark completed successfully
    Success = 0,

    /// Transfer or listing failure, or any other runtime error
    GeneralError = 1,

    /// User input error: invalid flags, missing environment, bad config file
    UsageError = 2,

    /// Backend does not support the requested mode
    UnsupportedFeature = 7,
}

impl ExitCode {
    /// Convert exit code to i32 for use with std::process::exit
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Create exit code from i32 value
    ///
    /// Returns None if the value doesn't correspond to a known exit code.
    pub const fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::GeneralError),
            2 => Some(Self::UsageError),
            7 => Some(Self::UnsupportedFeature),
            _ => None,
        }
    }

    /// Exit code for a failed benchmark
    pub fn from_error(error: &Error) -> Self {
        Self::from_i32(error.exit_code()).unwrap_or(Self::GeneralError)
    }

    /// Get a human-readable description of the exit code
    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "Benchmark completed successfully",
            Self::GeneralError => "General error",
            Self::UsageError => "Invalid arguments or configuration",
            Self::UnsupportedFeature => "Mode not supported by backend",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use gb_core::{ListingProgress, TransferProgress};

    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::GeneralError.as_i32(), 1);
        assert_eq!(ExitCode::UsageError.as_i32(), 2);
        assert_eq!(ExitCode::UnsupportedFeature.as_i32(), 7);
    }

    #[test]
    fn test_exit_code_from_i32() {
        assert_eq!(ExitCode::from_i32(0), Some(ExitCode::Success));
        assert_eq!(ExitCode::from_i32(1), Some(ExitCode::GeneralError));
        assert_eq!(ExitCode::from_i32(2), Some(ExitCode::UsageError));
        assert_eq!(ExitCode::from_i32(7), Some(ExitCode::UnsupportedFeature));
        assert_eq!(ExitCode::from_i32(99), None);
    }

    #[test]
    fn test_exit_code_from_error() {
        assert_eq!(
            ExitCode::from_error(&Error::MissingConfig("BUCKET_NAME".into())),
            ExitCode::UsageError
        );
        assert_eq!(
            ExitCode::from_error(&Error::UnsupportedOperation("null".into())),
            ExitCode::UnsupportedFeature
        );
        assert_eq!(
            ExitCode::from_error(&Error::ListingFailed {
                cause: "503".into(),
                progress: ListingProgress::default(),
            }),
            ExitCode::GeneralError
        );
        assert_eq!(
            ExitCode::from_error(&Error::TransferFailed {
                cause: "reset".into(),
                progress: TransferProgress::default(),
            }),
            ExitCode::GeneralError
        );
    }

    #[test]
    fn test_exit_code_display() {
        let display = format!("{}", ExitCode::Success);
        assert!(display.contains("0"));
        assert!(display.contains("successfully"));

        let display = format!("{}", ExitCode::UnsupportedFeature);
        assert!(display.contains("7"));
        assert!(display.contains("not supported"));
    }
}
