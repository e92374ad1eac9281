use serde::Deserialize;

/// Main configuration structure for Flatwatch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub fetch: FetchConfig,
    pub crawler: CrawlerConfig,
    pub search: SearchConfig,
    pub storage: StorageConfig,
}

/// HTTP fetch behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Retry delay schedule in seconds; one request attempt per slot
    #[serde(rename = "retry-delays")]
    pub retry_delays: Vec<u64>,

    /// Per-request timeout in seconds
    pub timeout: u64,

    /// User-agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

/// Crawl loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of ads the source renders per search page
    #[serde(rename = "ads-per-page")]
    pub ads_per_page: u32,

    /// Mandatory delay between listing ingestions (milliseconds)
    #[serde(rename = "listing-delay-ms")]
    pub listing_delay_ms: u64,

    /// Missed-listing ceiling; exceeding it aborts the run
    #[serde(rename = "max-missed-listings")]
    pub max_missed_listings: u32,

    /// How many times a failed page is re-attempted before it is abandoned
    #[serde(rename = "page-retry-limit")]
    pub page_retry_limit: u32,

    /// How many times the next-page transition is re-attempted before the
    /// crawl stops early
    #[serde(rename = "next-page-retry-limit")]
    pub next_page_retry_limit: u32,

    /// Fixed delay between page-level retry attempts (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,
}

/// Search source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Scheme + host of the source, e.g. "https://krisha.kz"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Search path appended to the base URL, with any filter parameters
    pub path: String,
}

impl SearchConfig {
    /// The fully-qualified URL of the first search result page
    pub fn start_url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Records per write transaction
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Attempt ceiling for a batch that keeps hitting write contention
    #[serde(rename = "write-retry-limit")]
    pub write_retry_limit: u32,
}
