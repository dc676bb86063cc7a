//! Error types for gb-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.
//! Failures raised after work has started carry the progress made so far.

use std::fmt;

use thiserror::Error;

/// Result type alias for gb-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Chunks and bytes completed before a transfer failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_completed: u64,
    pub chunks_completed: usize,
    pub chunks_total: usize,
}

impl fmt::Display for TransferProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes in {}/{} chunks completed",
            self.bytes_completed, self.chunks_completed, self.chunks_total
        )
    }
}

/// Pages and objects counted before a listing failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingProgress {
    pub page_count: usize,
    pub file_count: u64,
}

impl fmt::Display for ListingProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} objects listed",
            self.page_count, self.file_count
        )
    }
}

/// Error types for gb-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Bad flag combination or malformed size
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Required environment variable absent
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// Requested mode is not available on the selected backend
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A chunk or whole-object transfer failed
    #[error("Transfer failed: {cause} ({progress})")]
    TransferFailed {
        cause: String,
        progress: TransferProgress,
    },

    /// A listing page could not be fetched
    #[error("Listing failed: {cause} ({progress})")]
    ListingFailed {
        cause: String,
        progress: ListingProgress,
    },

    /// A backend call failed; the harness attaches progress before surfacing it
    #[error("Backend error: {0}")]
    Backend(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_)
            | Error::MissingConfig(_)
            | Error::TomlParse(_)
            | Error::InvalidUrl(_) => 2, // UsageError
            Error::UnsupportedOperation(_) => 7, // UnsupportedFeature
            _ => 1,                              // GeneralError
        }
    }

    /// Wrap a lower-level failure as a transfer failure with the given progress.
    ///
    /// Configuration and capability errors pass through untouched.
    pub fn into_transfer_failure(self, progress: TransferProgress) -> Self {
        match self {
            Error::Backend(cause) => Error::TransferFailed { cause, progress },
            Error::Io(e) => Error::TransferFailed {
                cause: e.to_string(),
                progress,
            },
            Error::TransferFailed { cause, .. } => Error::TransferFailed { cause, progress },
            other => other,
        }
    }

    /// Wrap a lower-level failure as a listing failure with the given progress.
    pub fn into_listing_failure(self, progress: ListingProgress) -> Self {
        match self {
            Error::Backend(cause) => Error::ListingFailed { cause, progress },
            Error::Io(e) => Error::ListingFailed {
                cause: e.to_string(),
                progress,
            },
            Error::ListingFailed { cause, .. } => Error::ListingFailed { cause, progress },
            other => other,
        }
    }

    /// Partial transfer counters, when the error carries them
    pub fn transfer_progress(&self) -> Option<TransferProgress> {
        match self {
            Error::TransferFailed { progress, .. } => Some(*progress),
            _ => None,
        }
    }

    /// Partial listing counters, when the error carries them
    pub fn listing_progress(&self) -> Option<ListingProgress> {
        match self {
            Error::ListingFailed { progress, .. } => Some(*progress),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::InvalidConfig("test".into()).exit_code(), 2);
        assert_eq!(Error::MissingConfig("test".into()).exit_code(), 2);
        assert_eq!(Error::UnsupportedOperation("test".into()).exit_code(), 7);
        assert_eq!(Error::Backend("test".into()).exit_code(), 1);
        assert_eq!(
            Error::ListingFailed {
                cause: "test".into(),
                progress: ListingProgress::default(),
            }
            .exit_code(),
            1
        );
        assert_eq!(
            Error::TransferFailed {
                cause: "test".into(),
                progress: TransferProgress::default(),
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::MissingConfig("BUCKET_NAME".into());
        assert_eq!(err.to_string(), "Missing configuration: BUCKET_NAME");

        let err = Error::ListingFailed {
            cause: "403 Forbidden".into(),
            progress: ListingProgress {
                page_count: 3,
                file_count: 3000,
            },
        };
        assert_eq!(
            err.to_string(),
            "Listing failed: 403 Forbidden (3 pages, 3000 objects listed)"
        );
    }

    #[test]
    fn test_backend_error_becomes_transfer_failure() {
        let progress = TransferProgress {
            bytes_completed: 30,
            chunks_completed: 1,
            chunks_total: 4,
        };
        let err = Error::Backend("connection reset".into()).into_transfer_failure(progress);
        assert_eq!(err.transfer_progress(), Some(progress));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_config_errors_are_not_rewrapped() {
        let err = Error::UnsupportedOperation("null sink".into())
            .into_transfer_failure(TransferProgress::default());
        assert!(matches!(err, Error::UnsupportedOperation(_)));

        let err = Error::InvalidConfig("page size".into())
            .into_listing_failure(ListingProgress::default());
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
