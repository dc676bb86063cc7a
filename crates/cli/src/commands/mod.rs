//! CLI command definitions and execution
//!
//! Two benchmarks: `list` measures paged listing throughput, `transfer`
//! measures single-object upload or download throughput.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use gb_core::{Config, ConfigManager, Error, FailurePolicy};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

pub mod list;
pub mod transfer;

/// gcs-bench - Google Cloud Storage throughput benchmarks
///
/// Measures object listing throughput and large-object transfer throughput
/// across the native SDK, the gcloud CLI and the S3-compatible API.
#[derive(Parser, Debug)]
#[command(name = "gcs-bench")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Print per-page or per-run diagnostic lines
    #[arg(long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// What to do when a benchmark fails [default: exit, or the config file value]
    #[arg(long, global = true, value_enum)]
    pub on_error: Option<OnError>,

    /// Configuration file [default: ~/.config/gcs-bench/config.toml]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Benchmark paged object listing
    List(list::ListArgs),

    /// Benchmark a single large-object upload or download
    Transfer(transfer::TransferArgs),
}

/// Failure policy flag
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnError {
    /// Print a diagnostic and exit non-zero
    Exit,
    /// Return the error to the caller unchanged
    Propagate,
}

impl From<OnError> for FailurePolicy {
    fn from(flag: OnError) -> Self {
        match flag {
            OnError::Exit => FailurePolicy::Exit,
            OnError::Propagate => FailurePolicy::Propagate,
        }
    }
}

/// `tracing` filter directives used when `RUST_LOG` is not set
pub fn log_directives(debug: bool, verbose: bool) -> String {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    format!("warn,gcs_bench={level},gb_core={level},gb_backends={level}")
}

fn load_config(path: Option<PathBuf>) -> gb_core::Result<Config> {
    let manager = match path {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    tracing::debug!(path = %manager.config_path().display(), "loading configuration");
    manager.load()
}

/// Execute the CLI command
///
/// Under the exit policy a failure is printed and mapped to an exit code.
/// Under the propagate policy the original error is returned.
pub async fn execute(cli: Cli) -> Result<ExitCode, Error> {
    let formatter = Formatter::new(OutputConfig {
        no_color: cli.no_color,
        verbose: cli.verbose,
        progress: false,
    });

    let flag_policy = cli.on_error.map(FailurePolicy::from);
    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => return settle(e, flag_policy.unwrap_or_default(), &formatter),
    };
    let policy = flag_policy.unwrap_or(config.defaults.on_error);

    let result = match cli.command {
        Commands::List(args) => list::execute(args, &config, &formatter).await,
        Commands::Transfer(args) => transfer::execute(args, &config, &formatter).await,
    };

    match result {
        Ok(()) => Ok(ExitCode::Success),
        Err(e) => settle(e, policy, &formatter),
    }
}

fn settle(error: Error, policy: FailurePolicy, formatter: &Formatter) -> Result<ExitCode, Error> {
    match policy {
        FailurePolicy::Propagate => Err(error),
        FailurePolicy::Exit => {
            formatter.error(&error.to_string());
            Ok(ExitCode::from_error(&error))
        }
    }
}
