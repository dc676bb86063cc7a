//! gb-core: Core library for the gcs-bench harness
//!
//! This crate provides the backend-independent parts of the benchmarks:
//! - Configuration and environment loading
//! - Chunk planning and the worker pool executor
//! - The paged listing walker
//! - Timing and result reporting
//!
//! Concrete clients live in `gb-backends` and plug in through the
//! `TransferBackend` and `ListingSource` traits.

pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod listing;
pub mod plan;
pub mod report;
pub mod traits;

pub use config::{Config, ConfigManager, FailurePolicy, HmacCredentials, TransferEnv};
pub use error::{Error, ListingProgress, Result, TransferProgress};
pub use executor::{NoProgress, ProgressSink, TransferOutcome, run_transfer};
pub use job::{Direction, LocalTarget, TransferJob};
pub use listing::{ListingPage, ListingRequest, ListingTally, run_listing, walk};
pub use plan::{Chunk, MIB};
pub use report::{BenchmarkResult, Stopwatch, Unit};
pub use traits::{
    BackendKind, Capabilities, ListingSource, Operation, PageResponse, PartTag, TransferBackend,
    TransferMode, UploadId,
};
