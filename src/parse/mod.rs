//! Page parsing
//!
//! The crawler core never touches HTML directly: it goes through the
//! [`PageParser`] capability, which turns fetched documents into typed
//! fields. Structural failures (an expected marker missing from the page)
//! are reported as [`ParseError::ElementNotFound`] and are fatal only to the
//! enclosing page or listing.

mod krisha;

pub use krisha::KrishaParser;

use thiserror::Error;

/// Errors produced by page parsing
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Expected element not found: {0}")]
    ElementNotFound(String),
}

/// Result type for parse operations
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Metadata extracted from the first search result page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMeta {
    /// Total number of ads the source reports for the search
    pub ad_count: u32,

    /// Number of result pages, derived from the ad count
    pub page_count: u32,
}

impl SearchMeta {
    /// Derives the page count from an ad count and the source's page size
    ///
    /// Exact multiples must not produce a trailing empty page: 40 ads at 20
    /// per page is 2 pages, 41 is 3.
    pub fn new(ad_count: u32, ads_per_page: u32) -> Self {
        let page_count = ad_count.div_ceil(ads_per_page);
        Self {
            ad_count,
            page_count,
        }
    }
}

/// Structured fields extracted from a listing detail page
///
/// Everything except the title is optional: detail pages vary and a missing
/// secondary field is not worth losing the listing over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFields {
    pub title: String,
    pub rooms: Option<u32>,
    pub area: Option<u32>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub description: Option<String>,
    pub photo: Option<String>,
    pub address: Option<String>,
}

/// The Page Parser capability consumed by the crawler core
pub trait PageParser {
    /// Extracts the ad count from the first search page and derives the
    /// page count from it
    fn search_meta(&self, doc: &str, ads_per_page: u32) -> ParseResult<SearchMeta>;

    /// Extracts the absolute listing URLs present on a search result page
    fn listing_urls(&self, doc: &str) -> ParseResult<Vec<String>>;

    /// Extracts the structured record fields from a listing detail page
    fn listing_fields(&self, doc: &str) -> ParseResult<ListingFields>;

    /// Extracts the current price from a listing detail page, if present
    fn listing_price(&self, doc: &str) -> Option<i64>;

    /// Extracts the "percent below market" indicator from a price-analysis
    /// document; best-effort, 0.0 when the marker is absent
    fn market_percent(&self, doc: &str) -> f64;

    /// Extracts the absolute URL of the next search result page
    fn next_page_url(&self, doc: &str) -> ParseResult<String>;
}
