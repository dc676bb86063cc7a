//! Backend trait definitions
//!
//! `TransferBackend` is the uniform surface over the heterogeneous transfer
//! mechanisms (native SDK, CLI subprocess, S3-compatible SDK). Each backend
//! declares which operations it supports; unsupported calls fail fast.
//! `ListingSource` is the paged listing surface used by the listing benchmark.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::job::{Direction, LocalTarget, TransferJob};
use crate::plan::Chunk;

/// Which client implementation performs the transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Native GCS client (JSON API, application default credentials)
    Sdk,
    /// `gcloud storage cp` subprocess
    Gcloud,
    /// S3-compatible client against the XML interoperability endpoint
    Aws,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Sdk => f.write_str("sdk"),
            BackendKind::Gcloud => f.write_str("gcloud"),
            BackendKind::Aws => f.write_str("aws"),
        }
    }
}

/// Individual operations a backend may or may not support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    UploadWhole,
    DownloadWhole,
    UploadChunk,
    DownloadChunk,
    NullSink,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::UploadWhole => "whole-object upload",
            Operation::DownloadWhole => "whole-object download",
            Operation::UploadChunk => "chunked upload",
            Operation::DownloadChunk => "chunked download",
            Operation::NullSink => "download to null",
        };
        f.write_str(name)
    }
}

/// Operations a backend implements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub upload_whole: bool,
    pub download_whole: bool,
    pub upload_chunk: bool,
    pub download_chunk: bool,
    /// Can download into a discard sink
    pub null_sink: bool,
}

impl Capabilities {
    /// Whole-object and chunked transfers in both directions, null sink included
    pub const fn full() -> Self {
        Self {
            upload_whole: true,
            download_whole: true,
            upload_chunk: true,
            download_chunk: true,
            null_sink: true,
        }
    }

    pub const fn supports(&self, op: Operation) -> bool {
        match op {
            Operation::UploadWhole => self.upload_whole,
            Operation::DownloadWhole => self.download_whole,
            Operation::UploadChunk => self.upload_chunk,
            Operation::DownloadChunk => self.download_chunk,
            Operation::NullSink => self.null_sink,
        }
    }

    /// Whether chunks in `direction` can be dispatched by the harness
    pub const fn supports_chunked(&self, direction: Direction) -> bool {
        match direction {
            Direction::Upload => self.upload_chunk,
            Direction::Download => self.download_chunk,
        }
    }

    /// Return `UnsupportedOperation` unless `op` is supported
    pub fn require(&self, kind: BackendKind, op: Operation) -> Result<()> {
        if self.supports(op) {
            Ok(())
        } else {
            Err(unsupported(kind, op))
        }
    }
}

/// How a backend actually moved the object, for labeling results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// One whole-object request
    Serial,
    /// Harness-dispatched chunks across the worker pool
    Chunked,
    /// One invocation whose internal parallelism belongs to the external tool
    Delegated,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Serial => f.write_str("serial"),
            TransferMode::Chunked => f.write_str("chunked"),
            TransferMode::Delegated => f.write_str("tool-managed"),
        }
    }
}

/// Identifier of an in-progress multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadId(pub String);

/// Receipt for one uploaded chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartTag {
    pub index: usize,
    pub etag: String,
}

pub(crate) fn unsupported(kind: BackendKind, op: Operation) -> Error {
    Error::UnsupportedOperation(format!("the {kind} backend does not support {op}"))
}

/// Trait for object transfer backends
///
/// Whole-object operations own their local file I/O. Chunk operations only
/// move bytes over the network; the executor reads and writes the local
/// byte ranges itself.
#[async_trait]
pub trait TransferBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn capabilities(&self) -> Capabilities;

    /// Decide how this backend will perform `job`
    fn transfer_mode(&self, job: &TransferJob) -> TransferMode {
        let caps = self.capabilities();
        if job.serial || job.size_bytes == 0 {
            TransferMode::Serial
        } else if caps.supports_chunked(job.direction) {
            TransferMode::Chunked
        } else {
            TransferMode::Delegated
        }
    }

    /// Size of the remote object in bytes
    async fn object_size(&self, key: &str) -> Result<u64>;

    /// Upload `source` as `key` in a single transfer; returns bytes sent
    async fn upload_whole(&self, key: &str, source: &Path) -> Result<u64>;

    /// Download `key` into `target` in a single transfer; returns bytes received
    async fn download_whole(&self, key: &str, target: &LocalTarget) -> Result<u64>;

    async fn begin_chunked_upload(&self, _key: &str) -> Result<UploadId> {
        Err(unsupported(self.kind(), Operation::UploadChunk))
    }

    async fn upload_chunk(
        &self,
        _key: &str,
        _upload: &UploadId,
        _chunk: &Chunk,
        _data: Bytes,
    ) -> Result<PartTag> {
        Err(unsupported(self.kind(), Operation::UploadChunk))
    }

    /// Finish a multipart upload; `parts` are ordered by chunk index
    async fn complete_chunked_upload(
        &self,
        _key: &str,
        _upload: &UploadId,
        _parts: Vec<PartTag>,
    ) -> Result<()> {
        Err(unsupported(self.kind(), Operation::UploadChunk))
    }

    /// Discard a failed multipart upload
    async fn abort_chunked_upload(&self, _key: &str, _upload: &UploadId) -> Result<()> {
        Ok(())
    }

    async fn download_chunk(&self, _key: &str, _chunk: &Chunk) -> Result<Bytes> {
        Err(unsupported(self.kind(), Operation::DownloadChunk))
    }
}

/// One page returned by a listing request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResponse {
    pub item_count: usize,
    /// Token for the next page; `None` when the listing is exhausted
    pub next_token: Option<String>,
}

/// Trait for paged bucket listing
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch up to `max_keys` objects starting at `continuation_token`
    async fn list_page(
        &self,
        bucket: &str,
        max_keys: i32,
        continuation_token: Option<String>,
    ) -> Result<PageResponse>;

    /// Location constraint of the bucket, if the service reports one
    async fn bucket_location(&self, bucket: &str) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_capability() {
        let caps = Capabilities {
            upload_whole: true,
            download_whole: true,
            ..Default::default()
        };
        assert!(caps.require(BackendKind::Gcloud, Operation::UploadWhole).is_ok());

        let err = caps
            .require(BackendKind::Gcloud, Operation::NullSink)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
        assert_eq!(
            err.to_string(),
            "Unsupported operation: the gcloud backend does not support download to null"
        );
    }

    #[test]
    fn test_full_capabilities() {
        let caps = Capabilities::full();
        assert!(caps.supports_chunked(Direction::Upload));
        assert!(caps.supports_chunked(Direction::Download));
        assert!(caps.supports(Operation::NullSink));
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(TransferMode::Serial.to_string(), "serial");
        assert_eq!(TransferMode::Chunked.to_string(), "chunked");
        assert_eq!(TransferMode::Delegated.to_string(), "tool-managed");
        assert_eq!(BackendKind::Aws.to_string(), "aws");
    }
}
