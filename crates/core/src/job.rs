//! Transfer job description
//!
//! A `TransferJob` holds everything the harness needs to run one upload or
//! download: which object, which local file, how large, and how to split it.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::plan::MIB;

/// Default chunk size: 25 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 25 * MIB;

/// Default number of concurrent chunk workers
pub const DEFAULT_WORKERS: usize = 50;

/// Direction of a transfer relative to the bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => f.write_str("upload"),
            Direction::Download => f.write_str("download"),
        }
    }
}

/// Local side of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalTarget {
    /// A regular file: upload source or download destination
    File(PathBuf),
    /// Discard sink; downloaded bytes are dropped so disk I/O stays out of the measurement
    Null,
}

impl LocalTarget {
    pub fn path(&self) -> Option<&Path> {
        match self {
            LocalTarget::File(path) => Some(path),
            LocalTarget::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, LocalTarget::Null)
    }
}

impl fmt::Display for LocalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalTarget::File(path) => write!(f, "{}", path.display()),
            LocalTarget::Null => f.write_str("/dev/null"),
        }
    }
}

/// One benchmarked transfer of a single object
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub direction: Direction,
    pub object_key: String,
    pub local: LocalTarget,
    pub size_bytes: u64,
    pub chunk_size_bytes: u64,
    pub worker_count: usize,
    /// Bypass chunking entirely and move the object in one request
    pub serial: bool,
}

impl TransferJob {
    /// Create a job with default chunk size and worker count
    pub fn new(
        direction: Direction,
        object_key: impl Into<String>,
        local: LocalTarget,
        size_bytes: u64,
    ) -> Self {
        Self {
            direction,
            object_key: object_key.into(),
            local,
            size_bytes,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            worker_count: DEFAULT_WORKERS,
            serial: false,
        }
    }

    pub fn chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size_bytes = bytes;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.worker_count = n;
        self
    }

    pub fn serial(mut self, serial: bool) -> Self {
        self.serial = serial;
        self
    }

    /// Check the job invariants before any backend is touched
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size_bytes == 0 {
            return Err(Error::InvalidConfig(
                "chunk size must be greater than zero".into(),
            ));
        }
        if self.worker_count == 0 {
            return Err(Error::InvalidConfig(
                "worker count must be at least 1".into(),
            ));
        }
        if self.object_key.is_empty() {
            return Err(Error::InvalidConfig("remote object key is empty".into()));
        }
        if self.direction == Direction::Upload && self.local.is_null() {
            return Err(Error::InvalidConfig(
                "the null sink is only valid for downloads".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_job() -> TransferJob {
        TransferJob::new(
            Direction::Upload,
            "bench/object.bin",
            LocalTarget::File(PathBuf::from("/tmp/object.bin")),
            100 * MIB,
        )
    }

    #[test]
    fn test_defaults() {
        let job = upload_job();
        assert_eq!(job.chunk_size_bytes, 25 * MIB);
        assert_eq!(job.worker_count, 50);
        assert!(!job.serial);
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let job = upload_job().chunk_size(0);
        assert!(matches!(job.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let job = upload_job().workers(0);
        assert!(matches!(job.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_null_upload_rejected() {
        let mut job = upload_job();
        job.local = LocalTarget::Null;
        assert!(matches!(job.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_null_download_allowed() {
        let job = TransferJob::new(Direction::Download, "k", LocalTarget::Null, 10);
        assert!(job.validate().is_ok());
        assert_eq!(job.local.to_string(), "/dev/null");
    }
}
