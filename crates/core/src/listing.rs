//! Pagination walker for the listing benchmark
//!
//! `walk` lazily fetches one page per poll and stops when the bucket is
//! exhausted or `max_results` objects have been listed. Each call lists from
//! scratch. The running page and object counters live with the caller.

use std::time::Duration;

use futures::{Stream, StreamExt};

use crate::error::{Error, ListingProgress, Result};
use crate::report::{BenchmarkResult, Stopwatch, Unit};
use crate::traits::ListingSource;

/// Default number of objects requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Default cap on the total number of objects listed
pub const DEFAULT_MAX_RESULTS: u64 = 25_000;

/// Parameters of one listing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub bucket: String,
    pub page_size: u32,
    pub max_results: u64,
}

impl ListingRequest {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            page_size: DEFAULT_PAGE_SIZE,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn page_size(mut self, n: u32) -> Self {
        self.page_size = n;
        self
    }

    pub fn max_results(mut self, n: u64) -> Self {
        self.max_results = n;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::InvalidConfig(
                "page size must be greater than zero".into(),
            ));
        }
        if self.bucket.is_empty() {
            return Err(Error::InvalidConfig("bucket name is empty".into()));
        }
        Ok(())
    }
}

/// One fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingPage {
    pub item_count: usize,
    /// 1-based position of the page in this walk
    pub page_index: usize,
    /// Time spent fetching this page
    pub elapsed: Duration,
}

impl ListingPage {
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Running counters accumulated by the caller of `walk`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingTally {
    pub page_count: usize,
    pub file_count: u64,
}

impl ListingTally {
    pub fn record(&mut self, page: &ListingPage) {
        self.page_count += 1;
        self.file_count += page.item_count as u64;
    }

    pub fn progress(&self) -> ListingProgress {
        ListingProgress {
            page_count: self.page_count,
            file_count: self.file_count,
        }
    }
}

struct WalkState {
    token: Option<String>,
    page_index: usize,
    listed: u64,
    exhausted: bool,
}

/// Lazily list `request.bucket` one page at a time.
///
/// Each page is timed around its own list request only. Time the caller
/// spends between polls is not counted.
pub fn walk<'a, S>(
    source: &'a S,
    request: &'a ListingRequest,
) -> impl Stream<Item = Result<ListingPage>> + 'a
where
    S: ListingSource + ?Sized,
{
    let state = WalkState {
        token: None,
        page_index: 0,
        listed: 0,
        exhausted: false,
    };

    futures::stream::try_unfold(state, move |mut state| async move {
        if state.exhausted || state.listed >= request.max_results {
            return Ok::<_, Error>(None);
        }

        let remaining = request.max_results - state.listed;
        let max_keys =
            i32::try_from(remaining.min(u64::from(request.page_size))).unwrap_or(i32::MAX);

        let watch = Stopwatch::start();
        let response = source
            .list_page(&request.bucket, max_keys, state.token.take())
            .await?;
        let elapsed = watch.elapsed();

        state.page_index += 1;
        state.listed += response.item_count as u64;
        state.exhausted = response.next_token.is_none();
        state.token = response.next_token;

        tracing::debug!(
            page = state.page_index,
            items = response.item_count,
            "listing page fetched"
        );

        let page = ListingPage {
            item_count: response.item_count,
            page_index: state.page_index,
            elapsed,
        };
        Ok(Some((page, state)))
    })
}

/// Walk the whole listing, calling `on_page` for each page, and time it.
///
/// A page failure aborts the walk with `ListingFailed` carrying the counts
/// accumulated so far.
pub async fn run_listing<S, F>(
    source: &S,
    request: &ListingRequest,
    mut on_page: F,
) -> Result<BenchmarkResult>
where
    S: ListingSource + ?Sized,
    F: FnMut(&ListingPage),
{
    request.validate()?;

    let mut tally = ListingTally::default();
    let watch = Stopwatch::start();
    let mut pages = std::pin::pin!(walk(source, request));
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| e.into_listing_failure(tally.progress()))?;
        tally.record(&page);
        on_page(&page);
    }

    Ok(BenchmarkResult::new(
        Unit::Objects,
        tally.file_count,
        watch.elapsed(),
    ))
}
