//! gcloud CLI backend
//!
//! Runs one `gcloud storage cp` per job. gcloud slices and parallelizes the
//! transfer itself; the harness only steers it through `CLOUDSDK_*`
//! properties set on the child process.

use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use gb_core::{
    BackendKind, Capabilities, Direction, Error, LocalTarget, Operation, Result, TransferBackend,
};

const PARALLEL_COMPOSITE_UPLOAD_ENABLED: &str =
    "CLOUDSDK_STORAGE_PARALLEL_COMPOSITE_UPLOAD_ENABLED";
const PARALLEL_COMPOSITE_UPLOAD_COMPONENT_SIZE: &str =
    "CLOUDSDK_STORAGE_PARALLEL_COMPOSITE_UPLOAD_COMPONENT_SIZE";
const SLICED_OBJECT_DOWNLOAD_THRESHOLD: &str = "CLOUDSDK_STORAGE_SLICED_OBJECT_DOWNLOAD_THRESHOLD";
const SLICED_OBJECT_DOWNLOAD_MAX_COMPONENTS: &str =
    "CLOUDSDK_STORAGE_SLICED_OBJECT_DOWNLOAD_MAX_COMPONENTS";
const SLICED_OBJECT_DOWNLOAD_COMPONENT_SIZE: &str =
    "CLOUDSDK_STORAGE_SLICED_OBJECT_DOWNLOAD_COMPONENT_SIZE";
const PROCESS_COUNT: &str = "CLOUDSDK_STORAGE_PROCESS_COUNT";
const THREAD_COUNT: &str = "CLOUDSDK_STORAGE_THREAD_COUNT";

/// Upper bound on download slices so the component size alone decides the count
const MAX_DOWNLOAD_COMPONENTS: u64 = 1_000_000;

/// How gcloud should slice and parallelize the copy
///
/// `None` leaves gcloud's own tuning in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcloudTuning {
    /// Disable composite uploads and sliced downloads
    pub serial: bool,
    /// Component size in bytes
    pub chunk_size: Option<u64>,
    /// Process count, one thread each
    pub workers: Option<usize>,
}

/// `gcloud storage` subprocess backend
#[derive(Debug, Clone)]
pub struct GcloudCli {
    program: String,
    bucket: String,
    tuning: GcloudTuning,
}

impl GcloudCli {
    pub fn new(program: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            bucket: bucket.into(),
            tuning: GcloudTuning::default(),
        }
    }

    pub fn with_tuning(mut self, tuning: GcloudTuning) -> Self {
        self.tuning = tuning;
        self
    }

    fn remote_url(&self, key: &str) -> String {
        format!("gs://{}/{key}", self.bucket)
    }

    /// Child-process environment for a copy in `direction`
    pub fn tuning_env(&self, direction: Direction) -> Vec<(&'static str, String)> {
        let mut env = Vec::new();
        match direction {
            Direction::Upload => {
                if self.tuning.serial {
                    env.push((PARALLEL_COMPOSITE_UPLOAD_ENABLED, "False".to_string()));
                }
                if let Some(size) = self.tuning.chunk_size {
                    env.push((PARALLEL_COMPOSITE_UPLOAD_COMPONENT_SIZE, size.to_string()));
                }
            }
            Direction::Download => {
                if self.tuning.serial {
                    env.push((SLICED_OBJECT_DOWNLOAD_THRESHOLD, "0".to_string()));
                }
                if let Some(size) = self.tuning.chunk_size {
                    env.push((
                        SLICED_OBJECT_DOWNLOAD_MAX_COMPONENTS,
                        MAX_DOWNLOAD_COMPONENTS.to_string(),
                    ));
                    env.push((SLICED_OBJECT_DOWNLOAD_COMPONENT_SIZE, size.to_string()));
                }
            }
        }
        if let Some(workers) = self.tuning.workers {
            env.push((PROCESS_COUNT, workers.to_string()));
            env.push((THREAD_COUNT, "1".to_string()));
        }
        env
    }

    /// Build the `gcloud storage cp` invocation without running it
    pub fn copy_command(&self, direction: Direction, key: &str, local: &Path) -> Command {
        let remote = self.remote_url(key);
        let mut cmd = Command::new(&self.program);
        cmd.args(["storage", "cp"]);
        match direction {
            Direction::Upload => cmd.arg(local).arg(&remote),
            Direction::Download => cmd.arg(&remote).arg(local),
        };
        cmd.envs(self.tuning_env(direction));
        cmd.kill_on_drop(true);
        cmd
    }

    /// Build the `gcloud storage objects describe` invocation for the object size
    pub fn describe_command(&self, key: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["storage", "objects", "describe"])
            .arg(self.remote_url(key))
            .arg("--format=value(size)");
        cmd
    }

    async fn run(&self, mut cmd: Command) -> Result<Output> {
        let output = cmd.output().await.map_err(|e| {
            Error::Backend(format!("failed to launch {}: {e}", self.program))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            tracing::info!("{}", stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            tracing::info!("{}", stderr.trim_end());
        }

        if !output.status.success() {
            return Err(Error::Backend(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

#[async_trait]
impl TransferBackend for GcloudCli {
    fn kind(&self) -> BackendKind {
        BackendKind::Gcloud
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            upload_whole: true,
            download_whole: true,
            ..Default::default()
        }
    }

    async fn object_size(&self, key: &str) -> Result<u64> {
        let output = self.run(self.describe_command(key)).await?;
        let text = String::from_utf8_lossy(&output.stdout);
        text.trim().parse().map_err(|_| {
            Error::Backend(format!(
                "unexpected size for {}: {:?}",
                self.remote_url(key),
                text.trim()
            ))
        })
    }

    async fn upload_whole(&self, key: &str, source: &Path) -> Result<u64> {
        let size = tokio::fs::metadata(source).await?.len();
        self.run(self.copy_command(Direction::Upload, key, source))
            .await?;
        Ok(size)
    }

    async fn download_whole(&self, key: &str, target: &LocalTarget) -> Result<u64> {
        let LocalTarget::File(dest) = target else {
            return Err(Error::UnsupportedOperation(format!(
                "the {} backend does not support {}",
                self.kind(),
                Operation::NullSink
            )));
        };
        self.run(self.copy_command(Direction::Download, key, dest))
            .await?;
        Ok(tokio::fs::metadata(dest).await?.len())
    }
}
