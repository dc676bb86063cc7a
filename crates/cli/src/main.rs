//! gcs-bench - Google Cloud Storage throughput benchmarks
//!
//! Benchmarks paged listing and single large-object transfers against GCS
//! through the native client, the gcloud CLI and the S3-compatible API.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gcs_bench::commands::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Existing environment variables win over .env entries
    dotenvy::dotenv().ok();

    let filter = if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(commands::log_directives(cli.debug, cli.verbose))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let exit_code = commands::execute(cli).await?;
    std::process::exit(exit_code.as_i32());
}
