//! Worker pool executor
//!
//! Runs one `TransferJob` against a backend. Serial jobs issue a single
//! whole-object call. Chunked jobs spawn `worker_count` tasks that claim
//! chunk indices from a precomputed plan until it is exhausted or a worker
//! fails. A failure stops new claims, lets in-flight chunks drain, and
//! fails the whole job.
//!
//! Each worker reads or writes only its claimed byte range of the local
//! file, so no locking is needed around file access.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::task::JoinSet;

use crate::error::{Error, Result, TransferProgress};
use crate::job::{Direction, TransferJob};
use crate::plan::{self, Chunk};
use crate::report::{BenchmarkResult, Stopwatch, Unit, measure};
use crate::traits::{BackendKind, Operation, PartTag, TransferBackend, TransferMode, UploadId};

/// Receives byte counts as chunks complete
pub trait ProgressSink: Send + Sync {
    fn advance(&self, bytes: u64);
}

/// Progress sink that ignores updates
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&self, _bytes: u64) {}
}

/// Result of a transfer benchmark, labeled with how it was performed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferOutcome {
    pub kind: BackendKind,
    pub mode: TransferMode,
    /// Number of planned chunks; 1 for whole-object transfers
    pub chunk_count: usize,
    pub result: BenchmarkResult,
}

/// Validate `job`, pick the transfer mode, plan chunks and execute.
pub async fn run_transfer(
    job: &TransferJob,
    backend: Arc<dyn TransferBackend>,
    progress: Arc<dyn ProgressSink>,
) -> Result<TransferOutcome> {
    job.validate()?;

    let kind = backend.kind();
    let caps = backend.capabilities();
    let mode = backend.transfer_mode(job);

    if job.direction == Direction::Download && job.local.is_null() {
        caps.require(kind, Operation::NullSink)?;
    }

    let chunks = if mode == TransferMode::Chunked {
        match job.direction {
            Direction::Upload => {
                caps.require(kind, Operation::UploadChunk)?;
                plan::check_multipart_limits(job.size_bytes, job.chunk_size_bytes)?;
            }
            Direction::Download => caps.require(kind, Operation::DownloadChunk)?,
        }
        Some(plan::plan(job.size_bytes, job.chunk_size_bytes)?)
    } else {
        match job.direction {
            Direction::Upload => caps.require(kind, Operation::UploadWhole)?,
            Direction::Download => caps.require(kind, Operation::DownloadWhole)?,
        }
        None
    };

    let chunk_count = chunks.as_ref().map_or(1, Vec::len);
    tracing::debug!(%kind, %mode, chunk_count, workers = job.worker_count, "starting transfer");

    let result = execute(job, backend, chunks, progress).await?;

    Ok(TransferOutcome {
        kind,
        mode,
        chunk_count,
        result,
    })
}

/// Execute `job`, timing from first dispatch to last completion.
///
/// `None` (or an empty plan) performs one whole-object transfer.
pub async fn execute(
    job: &TransferJob,
    backend: Arc<dyn TransferBackend>,
    chunks: Option<Vec<Chunk>>,
    progress: Arc<dyn ProgressSink>,
) -> Result<BenchmarkResult> {
    job.validate()?;

    let chunks = match chunks {
        Some(chunks) if !chunks.is_empty() => chunks,
        _ => return execute_whole(job, backend.as_ref(), progress.as_ref()).await,
    };

    let shared = Arc::new(Shared {
        job: job.clone(),
        backend,
        queue: ChunkQueue::new(chunks),
        bytes_done: AtomicU64::new(0),
        chunks_done: AtomicUsize::new(0),
        progress,
    });

    match job.direction {
        Direction::Upload => execute_chunked_upload(shared).await,
        Direction::Download => execute_chunked_download(shared).await,
    }
}

async fn execute_whole(
    job: &TransferJob,
    backend: &dyn TransferBackend,
    progress: &dyn ProgressSink,
) -> Result<BenchmarkResult> {
    let nothing_done = TransferProgress {
        chunks_total: 1,
        ..Default::default()
    };

    let source = match job.direction {
        Direction::Upload => Some(job.local.path().ok_or_else(|| {
            Error::InvalidConfig("upload requires a local source file".into())
        })?),
        Direction::Download => None,
    };

    let (transferred, elapsed) = measure(async {
        match source {
            Some(source) => backend.upload_whole(&job.object_key, source).await,
            None => backend.download_whole(&job.object_key, &job.local).await,
        }
    })
    .await;
    let transferred = transferred.map_err(|e| e.into_transfer_failure(nothing_done))?;

    progress.advance(transferred);
    Ok(BenchmarkResult::new(Unit::Bytes, transferred, elapsed))
}

async fn execute_chunked_upload(shared: Arc<Shared>) -> Result<BenchmarkResult> {
    let key = shared.job.object_key.clone();
    let backend = Arc::clone(&shared.backend);

    let watch = Stopwatch::start();
    let upload = backend
        .begin_chunked_upload(&key)
        .await
        .map_err(|e| e.into_transfer_failure(shared.snapshot()))?;
    let upload = Arc::new(upload);

    match dispatch(Arc::clone(&shared), Some(Arc::clone(&upload))).await {
        Ok(mut parts) => {
            parts.sort_by_key(|p| p.index);
            backend
                .complete_chunked_upload(&key, &upload, parts)
                .await
                .map_err(|e| e.into_transfer_failure(shared.snapshot()))?;
        }
        Err(e) => {
            let progress = shared.snapshot();
            if let Err(abort_err) = backend.abort_chunked_upload(&key, &upload).await {
                tracing::warn!("Failed to abort multipart upload {}: {abort_err}", upload.0);
            }
            return Err(e.into_transfer_failure(progress));
        }
    }
    let elapsed = watch.elapsed();

    Ok(BenchmarkResult::new(
        Unit::Bytes,
        shared.bytes_done.load(Ordering::SeqCst),
        elapsed,
    ))
}

async fn execute_chunked_download(shared: Arc<Shared>) -> Result<BenchmarkResult> {
    let (outcome, elapsed) = measure(async {
        if let Some(path) = shared.job.local.path() {
            preallocate(path, shared.job.size_bytes).await?;
        }
        dispatch(Arc::clone(&shared), None).await.map(drop)
    })
    .await;
    outcome.map_err(|e| e.into_transfer_failure(shared.snapshot()))?;

    Ok(BenchmarkResult::new(
        Unit::Bytes,
        shared.bytes_done.load(Ordering::SeqCst),
        elapsed,
    ))
}

/// Spawn the pool, wait for every worker, and return the first error if any.
async fn dispatch(shared: Arc<Shared>, upload: Option<Arc<UploadId>>) -> Result<Vec<PartTag>> {
    let workers = shared.job.worker_count.min(shared.queue.len());
    let mut set = JoinSet::new();
    for _ in 0..workers {
        set.spawn(worker(Arc::clone(&shared), upload.clone()));
    }

    let mut parts = Vec::with_capacity(shared.queue.len());
    let mut first_error = None;
    while let Some(joined) = set.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(join_err) => {
                shared.queue.halt();
                Err(Error::Backend(format!("chunk worker panicked: {join_err}")))
            }
        };
        match outcome {
            Ok(worker_parts) => parts.extend(worker_parts),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(parts),
    }
}

async fn worker(shared: Arc<Shared>, upload: Option<Arc<UploadId>>) -> Result<Vec<PartTag>> {
    let mut parts = Vec::new();
    while let Some(chunk) = shared.queue.claim() {
        let outcome = match &upload {
            Some(upload) => upload_one(&shared, upload, &chunk).await.map(Some),
            None => download_one(&shared, &chunk).await.map(|()| None),
        };
        match outcome {
            Ok(part) => {
                parts.extend(part);
                shared.record(&chunk);
            }
            Err(e) => {
                tracing::debug!(index = chunk.index, "chunk failed: {e}");
                shared.queue.halt();
                return Err(e);
            }
        }
    }
    Ok(parts)
}

async fn upload_one(shared: &Shared, upload: &UploadId, chunk: &Chunk) -> Result<PartTag> {
    let source = shared
        .job
        .local
        .path()
        .ok_or_else(|| Error::InvalidConfig("upload requires a local source file".into()))?;
    let data = read_range(source, chunk).await?;
    let tag = shared
        .backend
        .upload_chunk(&shared.job.object_key, upload, chunk, data)
        .await?;
    tracing::debug!(index = chunk.index, bytes = chunk.length, "chunk uploaded");
    Ok(tag)
}

async fn download_one(shared: &Shared, chunk: &Chunk) -> Result<()> {
    let data = shared
        .backend
        .download_chunk(&shared.job.object_key, chunk)
        .await?;
    if data.len() as u64 != chunk.length {
        return Err(Error::Backend(format!(
            "chunk {} returned {} bytes, expected {}",
            chunk.index,
            data.len(),
            chunk.length
        )));
    }
    if let Some(dest) = shared.job.local.path() {
        write_range(dest, chunk.offset, &data).await?;
    }
    tracing::debug!(index = chunk.index, bytes = chunk.length, "chunk downloaded");
    Ok(())
}

async fn read_range(path: &Path, chunk: &Chunk) -> std::io::Result<Bytes> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(chunk.offset)).await?;
    let mut buf = vec![0u8; chunk.length as usize];
    file.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

async fn write_range(path: &Path, offset: u64, data: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    file.write_all(data).await?;
    file.flush().await
}

async fn preallocate(path: &Path, size: u64) -> std::io::Result<()> {
    let file = File::create(path).await?;
    file.set_len(size).await
}

/// State shared by the workers of one job
struct Shared {
    job: TransferJob,
    backend: Arc<dyn TransferBackend>,
    queue: ChunkQueue,
    bytes_done: AtomicU64,
    chunks_done: AtomicUsize,
    progress: Arc<dyn ProgressSink>,
}

impl Shared {
    fn record(&self, chunk: &Chunk) {
        self.bytes_done.fetch_add(chunk.length, Ordering::SeqCst);
        self.chunks_done.fetch_add(1, Ordering::SeqCst);
        self.progress.advance(chunk.length);
    }

    fn snapshot(&self) -> TransferProgress {
        TransferProgress {
            bytes_completed: self.bytes_done.load(Ordering::SeqCst),
            chunks_completed: self.chunks_done.load(Ordering::SeqCst),
            chunks_total: self.queue.len(),
        }
    }
}

/// Hands out each planned chunk to exactly one caller
struct ChunkQueue {
    plan: Vec<Chunk>,
    next: AtomicUsize,
    halted: AtomicBool,
}

impl ChunkQueue {
    fn new(plan: Vec<Chunk>) -> Self {
        Self {
            plan,
            next: AtomicUsize::new(0),
            halted: AtomicBool::new(false),
        }
    }

    fn len(&self) -> usize {
        self.plan.len()
    }

    fn claim(&self) -> Option<Chunk> {
        if self.halted.load(Ordering::SeqCst) {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        self.plan.get(index).copied()
    }

    /// Stop handing out chunks; already claimed ones still finish
    fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }
}
