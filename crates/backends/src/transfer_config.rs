//! Transfer configuration for the S3-compatible backend
//!
//! Bundles the multipart threshold, part size and concurrency that decide
//! how `S3Client` moves an object. Objects below the threshold go in one
//! request; larger ones are split into parts of `multipart_chunksize`
//! uploaded or fetched by `max_concurrency` workers.

use gb_core::TransferJob;
use gb_core::job::{DEFAULT_CHUNK_SIZE, DEFAULT_WORKERS};
use gb_core::plan::{MAX_PARTS, MIN_PART_SIZE};

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Multipart transfer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Objects of at least this many bytes are transferred in parts
    pub multipart_threshold: u64,

    /// Part size in bytes
    pub multipart_chunksize: u64,

    /// Number of concurrent part transfers
    pub max_concurrency: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: DEFAULT_CHUNK_SIZE,
            multipart_chunksize: DEFAULT_CHUNK_SIZE,
            max_concurrency: DEFAULT_WORKERS,
        }
    }
}

impl TransferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Threshold, part size and concurrency all taken from one chunk size and worker count
    pub fn for_chunks(chunk_size: u64, workers: usize) -> Self {
        Self::new()
            .multipart_threshold(chunk_size)
            .multipart_chunksize(chunk_size)
            .max_concurrency(workers)
    }

    pub fn multipart_threshold(mut self, bytes: u64) -> Self {
        self.multipart_threshold = bytes;
        self
    }

    pub fn multipart_chunksize(mut self, bytes: u64) -> Self {
        self.multipart_chunksize = bytes.min(MAX_PART_SIZE);
        self
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    /// Whether an object of `size_bytes` is transferred in parts
    pub fn uses_multipart(&self, size_bytes: u64) -> bool {
        size_bytes > 0 && size_bytes >= self.multipart_threshold
    }

    /// Smallest part size that keeps `file_size` within the part count limit
    pub fn part_size_for(&self, file_size: u64) -> u64 {
        let parts = file_size.div_ceil(self.multipart_chunksize.max(1));
        if parts <= MAX_PARTS as u64 {
            self.multipart_chunksize
        } else {
            file_size
                .div_ceil(MAX_PARTS as u64)
                .clamp(MIN_PART_SIZE, MAX_PART_SIZE)
        }
    }

    /// Apply part size and concurrency to `job`, growing the part size if the
    /// object would otherwise need more than the part count limit
    pub fn configure(&self, job: TransferJob) -> TransferJob {
        let part_size = self.part_size_for(job.size_bytes);
        job.chunk_size(part_size).workers(self.max_concurrency)
    }
}
