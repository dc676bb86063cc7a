//! transfer command - Benchmark a single large-object transfer
//!
//! Uploads `LOCAL_FILENAME` to `gs://BUCKET_NAME/REMOTE_FILENAME`, or
//! downloads it back, through one of three clients and reports MiB/s.

use std::sync::Arc;

use clap::Args;
use gb_backends::{GcloudCli, GcloudTuning, GcsClient, InteropOptions, S3Client, TransferConfig};
use gb_core::plan::chunk_count;
use gb_core::{
    BackendKind, Config, Direction, Error, LocalTarget, MIB, Operation, Result, TransferBackend,
    TransferEnv, TransferJob, TransferProgress, report, run_transfer,
};

use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Benchmark an upload or download
#[derive(Args, Debug)]
pub struct TransferArgs {
    #[command(flatten)]
    pub direction: DirectionArgs,

    #[command(flatten)]
    pub tool: ToolArgs,

    /// Serialized transfer (no multipart upload or chunking)
    #[arg(long)]
    pub serial: bool,

    /// Download to null instead of LOCAL_FILENAME
    #[arg(long)]
    pub null: bool,

    /// Chunk size in MiB [default: 25; gcloud self-tunes unless given]
    #[arg(long, value_name = "MB")]
    pub chunksize: Option<u64>,

    /// Number of workers [default: 50; gcloud self-tunes unless given]
    #[arg(long)]
    pub workers: Option<usize>,

    /// Show a progress bar on stderr
    #[arg(long)]
    pub progress: bool,
}

/// Transfer direction
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct DirectionArgs {
    /// Upload LOCAL_FILENAME
    #[arg(long)]
    pub upload: bool,

    /// Download REMOTE_FILENAME
    #[arg(long)]
    pub download: bool,
}

/// Transfer client
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ToolArgs {
    /// Native GCS client
    #[arg(long)]
    pub sdk: bool,

    /// gcloud storage cp
    #[arg(long)]
    pub gcloud: bool,

    /// S3-compatible client against the XML API
    #[arg(long)]
    pub aws: bool,
}

impl TransferArgs {
    pub fn direction(&self) -> Direction {
        if self.direction.upload {
            Direction::Upload
        } else {
            Direction::Download
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        if self.tool.gcloud {
            BackendKind::Gcloud
        } else if self.tool.aws {
            BackendKind::Aws
        } else {
            BackendKind::Sdk
        }
    }

    /// Reject flag combinations before any environment or network access
    pub fn validate(&self) -> Result<()> {
        if self.null && self.direction() == Direction::Upload {
            return Err(Error::InvalidConfig(
                "--null is only valid with --download".into(),
            ));
        }
        if self.chunksize == Some(0) {
            return Err(Error::InvalidConfig(
                "--chunksize must be greater than zero".into(),
            ));
        }
        if self.workers == Some(0) {
            return Err(Error::InvalidConfig("--workers must be at least 1".into()));
        }
        Ok(())
    }

    /// Chunk size in bytes, from the flag or the config file
    pub fn chunk_size_bytes(&self, config: &Config) -> Result<u64> {
        let mb = self.chunksize.unwrap_or(config.defaults.chunk_size_mb);
        mb.checked_mul(MIB)
            .ok_or_else(|| Error::InvalidConfig(format!("--chunksize {mb} is too large")))
    }

    pub fn worker_count(&self, config: &Config) -> usize {
        self.workers.unwrap_or(config.defaults.workers)
    }

    /// gcloud tuning; only explicitly passed flags override gcloud's own choices
    pub fn gcloud_tuning(&self) -> GcloudTuning {
        GcloudTuning {
            serial: self.serial,
            chunk_size: self.chunksize.map(|mb| mb.saturating_mul(MIB)),
            workers: self.workers,
        }
    }
}

async fn connect(
    args: &TransferArgs,
    env: &TransferEnv,
    config: &Config,
    transfer: TransferConfig,
) -> Result<Arc<dyn TransferBackend>> {
    let backend: Arc<dyn TransferBackend> = match args.backend_kind() {
        BackendKind::Sdk => Arc::new(GcsClient::new(&env.bucket)?),
        BackendKind::Gcloud => Arc::new(
            GcloudCli::new(&config.gcloud.program, &env.bucket).with_tuning(args.gcloud_tuning()),
        ),
        BackendKind::Aws => {
            let options = InteropOptions {
                endpoint: config.interop.endpoint.clone(),
                region: config.interop.region.clone(),
                credentials: Some(env.require_credentials()?.clone()),
            };
            Arc::new(
                S3Client::new(&env.bucket, options)
                    .await?
                    .with_transfer_config(transfer),
            )
        }
    };
    Ok(backend)
}

async fn local_size(env: &TransferEnv) -> Result<u64> {
    match tokio::fs::metadata(&env.local_path).await {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        _ => Err(Error::InvalidConfig(format!(
            "upload source {} is not a regular file",
            env.local_path.display()
        ))),
    }
}

/// Execute the transfer command
pub async fn execute(args: TransferArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    args.validate()?;
    let env = TransferEnv::from_env()?;

    let direction = args.direction();
    let kind = args.backend_kind();
    let chunk_size = args.chunk_size_bytes(config)?;
    let workers = args.worker_count(config);
    let transfer = TransferConfig::for_chunks(chunk_size, workers);

    let backend = connect(&args, &env, config, transfer).await?;

    // Before any size lookup, which may already launch a subprocess
    if args.null {
        backend.capabilities().require(kind, Operation::NullSink)?;
    }

    let size = match direction {
        Direction::Upload => local_size(&env).await?,
        Direction::Download => backend
            .object_size(&env.remote_key)
            .await
            .map_err(|e| e.into_transfer_failure(TransferProgress::default()))?,
    };

    let local = if args.null {
        LocalTarget::Null
    } else {
        LocalTarget::File(env.local_path.clone())
    };
    let mut job = TransferJob::new(direction, &env.remote_key, local, size)
        .chunk_size(chunk_size)
        .workers(workers)
        .serial(args.serial);
    if kind == BackendKind::Aws {
        job = transfer.configure(job);
    }

    formatter.verbose(&format!(
        "local file={}, remote file={}, file size={:.2} MiB",
        job.local,
        env.remote_url(),
        size as f64 / MIB as f64
    ));
    if kind != BackendKind::Gcloud {
        formatter.verbose(&format!(
            "worker count={}, chunk size={:.2} MiB, total chunks={}",
            job.worker_count,
            job.chunk_size_bytes as f64 / MIB as f64,
            chunk_count(size, job.chunk_size_bytes)
        ));
    }

    let progress = Arc::new(ProgressBar::new(
        OutputConfig {
            progress: args.progress,
            ..formatter.config()
        },
        size,
    ));

    match run_transfer(&job, backend, progress.clone()).await {
        Ok(outcome) => {
            progress.finish();
            formatter.println(&report::transfer_summary(
                outcome.kind,
                outcome.mode,
                direction,
                &outcome.result,
            ));
            Ok(())
        }
        Err(e) => {
            progress.finish_and_clear();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::commands::{Cli, Commands};

    fn try_parse(args: &[&str]) -> std::result::Result<TransferArgs, clap::Error> {
        let mut argv = vec!["gcs-bench", "transfer"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).map(|cli| match cli.command {
            Commands::Transfer(args) => args,
            other => panic!("expected transfer, got {other:?}"),
        })
    }

    fn parse(args: &[&str]) -> TransferArgs {
        try_parse(args).unwrap()
    }

    #[test]
    fn test_parse_upload_sdk() {
        let args = parse(&["--upload", "--sdk"]);
        assert_eq!(args.direction(), Direction::Upload);
        assert_eq!(args.backend_kind(), BackendKind::Sdk);
        assert!(!args.serial);

        let config = Config::default();
        assert_eq!(args.chunk_size_bytes(&config).unwrap(), 25 * MIB);
        assert_eq!(args.worker_count(&config), 50);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_download_aws_tuned() {
        let args = parse(&[
            "--download",
            "--aws",
            "--chunksize",
            "100",
            "--workers",
            "8",
            "--null",
        ]);
        assert_eq!(args.direction(), Direction::Download);
        assert_eq!(args.backend_kind(), BackendKind::Aws);
        assert!(args.null);
        assert_eq!(args.chunk_size_bytes(&Config::default()).unwrap(), 100 * MIB);
        assert_eq!(args.worker_count(&Config::default()), 8);
    }

    #[test]
    fn test_direction_required_and_exclusive() {
        assert!(try_parse(&["--sdk"]).is_err());
        assert!(try_parse(&["--upload", "--download", "--sdk"]).is_err());
    }

    #[test]
    fn test_tool_required_and_exclusive() {
        assert!(try_parse(&["--upload"]).is_err());
        assert!(try_parse(&["--upload", "--sdk", "--gcloud"]).is_err());
    }

    #[test]
    fn test_null_upload_rejected() {
        let args = parse(&["--upload", "--sdk", "--null"]);
        assert!(matches!(args.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_values_rejected() {
        let args = parse(&["--upload", "--sdk", "--chunksize", "0"]);
        assert!(matches!(args.validate(), Err(Error::InvalidConfig(_))));

        let args = parse(&["--upload", "--sdk", "--workers", "0"]);
        assert!(matches!(args.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        let args = parse(&["--upload", "--sdk", "--chunksize", &u64::MAX.to_string()]);
        assert!(matches!(
            args.chunk_size_bytes(&Config::default()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_gcloud_tuning_only_from_explicit_flags() {
        let args = parse(&["--download", "--gcloud"]);
        assert_eq!(args.gcloud_tuning(), GcloudTuning::default());

        let args = parse(&["--download", "--gcloud", "--serial", "--chunksize", "50"]);
        assert_eq!(
            args.gcloud_tuning(),
            GcloudTuning {
                serial: true,
                chunk_size: Some(50 * MIB),
                workers: None,
            }
        );
    }

    #[test]
    fn test_config_defaults_apply() {
        let mut config = Config::default();
        config.defaults.chunk_size_mb = 8;
        config.defaults.workers = 4;
        let args = parse(&["--download", "--sdk"]);
        assert_eq!(args.chunk_size_bytes(&config).unwrap(), 8 * MIB);
        assert_eq!(args.worker_count(&config), 4);
    }

    #[tokio::test]
    async fn test_missing_upload_source() {
        let dir = tempfile::tempdir().unwrap();
        let env = TransferEnv {
            bucket: "b".into(),
            remote_key: "k".into(),
            local_path: dir.path().join("absent.bin"),
            credentials: None,
        };
        assert!(matches!(
            local_size(&env).await,
            Err(Error::InvalidConfig(_))
        ));

        let env = TransferEnv {
            local_path: dir.path().to_path_buf(),
            ..env
        };
        assert!(matches!(
            local_size(&env).await,
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_gcloud_null_rejected_by_capabilities() {
        let args = parse(&["--download", "--gcloud", "--null"]);
        let env = TransferEnv {
            bucket: "b".into(),
            remote_key: "k".into(),
            local_path: "/tmp/k".into(),
            credentials: None,
        };
        let config = Config::default();
        let backend = connect(&args, &env, &config, TransferConfig::default())
            .await
            .unwrap();
        assert!(matches!(
            backend
                .capabilities()
                .require(args.backend_kind(), Operation::NullSink),
            Err(Error::UnsupportedOperation(_))
        ));
    }
}
