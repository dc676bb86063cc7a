//! list command - Benchmark paged object listing
//!
//! Lists up to `--maxresults` objects from a bucket, one page of
//! `--pagesize` at a time, and reports objects listed per second.

use clap::{Args, ValueEnum};
use gb_backends::{InteropOptions, S3Client};
use gb_core::{
    Config, HmacCredentials, ListingRequest, ListingSource as _, Result, report, run_listing,
};

use crate::output::Formatter;

/// Public dataset bucket to list when no bucket is named
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Location {
    #[default]
    Us,
    Eu,
    #[value(name = "us-central1")]
    UsCentral1,
}

impl Location {
    /// A large public bucket in this location
    pub const fn public_bucket(self) -> &'static str {
        match self {
            Location::Us => "gcp-public-data-nexrad-l2",
            Location::Eu => "gcp-public-data-sentinel-2",
            Location::UsCentral1 => "gcp-public-data-arco-era5",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Location::Us => "US",
            Location::Eu => "EU",
            Location::UsCentral1 => "US-CENTRAL1",
        }
    }
}

/// Benchmark object listing
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Objects requested per page [default: 1000]
    #[arg(long)]
    pub pagesize: Option<u32>,

    /// Stop after this many objects [default: 25000]
    #[arg(long)]
    pub maxresults: Option<u64>,

    /// List a public dataset bucket in this location [default: us]
    #[arg(long, value_enum, conflicts_with = "bucket")]
    pub location: Option<Location>,

    /// List this bucket instead of a public dataset
    ///
    /// Listing goes through the S3-compatible XML API. A private bucket
    /// needs ACCESS_KEY and SECRET_KEY (HMAC keys); application default
    /// credentials are not used here.
    #[arg(long)]
    pub bucket: Option<String>,
}

impl ListArgs {
    pub fn bucket_name(&self) -> String {
        match &self.bucket {
            Some(bucket) => bucket.clone(),
            None => self.location.unwrap_or_default().public_bucket().to_string(),
        }
    }

    pub fn request(&self, config: &Config) -> ListingRequest {
        ListingRequest::new(self.bucket_name())
            .page_size(self.pagesize.unwrap_or(config.defaults.page_size))
            .max_results(self.maxresults.unwrap_or(config.defaults.max_results))
    }
}

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let request = args.request(config);
    request.validate()?;

    let client = S3Client::new(
        &request.bucket,
        InteropOptions {
            endpoint: config.interop.endpoint.clone(),
            region: config.interop.region.clone(),
            credentials: HmacCredentials::from_env(),
        },
    )
    .await?;

    if formatter.is_verbose() {
        let location = match client.bucket_location(&request.bucket).await {
            Ok(Some(location)) => location,
            Ok(None) => fallback_location(&args),
            Err(e) => {
                tracing::warn!("Could not read bucket location: {e}");
                fallback_location(&args)
            }
        };
        formatter.verbose(&format!("Using bucket {} in {location}", request.bucket));
    }

    let result = run_listing(&client, &request, |page| {
        formatter.verbose(&format!(
            "Response {} in {:.2}s, Items in response: {}",
            page.page_index,
            page.elapsed_seconds(),
            page.item_count
        ));
    })
    .await?;

    formatter.println(&report::listing_summary(&result));
    Ok(())
}

fn fallback_location(args: &ListArgs) -> String {
    match (&args.bucket, args.location) {
        (None, location) => location.unwrap_or_default().as_str().to_string(),
        (Some(_), _) => "an unknown location".to_string(),
    }
}
