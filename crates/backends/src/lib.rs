//! gb-backends: Transfer and listing backends for gcs-bench
//!
//! Three implementations of `gb_core::TransferBackend`:
//! - `GcsClient`: native GCS JSON API through object_store
//! - `GcloudCli`: one `gcloud storage` subprocess per job
//! - `S3Client`: aws-sdk-s3 against the GCS XML interoperability endpoint
//!
//! `S3Client` also implements `gb_core::ListingSource` for the listing
//! benchmark. This is the only crate that depends on cloud SDKs.

pub mod gcloud;
pub mod gcs;
pub mod s3;
pub mod transfer_config;

pub use gcloud::{GcloudCli, GcloudTuning};
pub use gcs::GcsClient;
pub use s3::{InteropOptions, S3Client};
pub use transfer_config::TransferConfig;
