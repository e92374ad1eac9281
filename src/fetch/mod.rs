//! HTTP fetching
//!
//! One [`Fetcher`] instance is shared by the whole crawl: search pages,
//! listing detail pages, and the price-analysis endpoint all go through the
//! same retry schedule.

mod client;

pub use client::{build_http_client, FetchError, Fetcher, PRICE_ANALYSIS_PATH};
