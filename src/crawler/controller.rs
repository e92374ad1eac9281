//! Pagination controller - the main crawl loop
//!
//! Pages are processed strictly in ascending order; within a page, listings
//! are ingested sequentially with a mandatory delay between them. That
//! ordering is a rate limit against the source, not a performance choice,
//! so there is no fan-out anywhere in the loop. All retries block the
//! calling flow; cancellation is checked between pages and listings only.

use crate::config::Config;
use crate::crawler::ingest::{listing_id, should_ingest, IngestOutcome, Ingestor};
use crate::crawler::RunContext;
use crate::fetch::Fetcher;
use crate::parse::PageParser;
use crate::retry::Backoff;
use crate::storage::Store;
use crate::{FlatwatchError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Drives one crawl run over the paginated search results
pub struct Crawler<P, S> {
    config: Config,
    fetcher: Fetcher,
    parser: P,
    store: S,
    shutdown: Arc<AtomicBool>,
}

impl<P: PageParser, S: Store> Crawler<P, S> {
    /// Creates a crawler over an injected parser and store
    pub fn new(config: Config, parser: P, store: S, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let fetcher = Fetcher::new(&config.fetch)?;
        Ok(Self {
            config,
            fetcher,
            parser,
            store,
            shutdown,
        })
    }

    /// Runs one full crawl from the configured start URL
    ///
    /// Returns `Ok` on completion, on cooperative shutdown, and on early
    /// termination because the pagination link was lost; the only abort
    /// surfaced as an error from the loop itself is the missed-listing
    /// circuit breaker.
    pub async fn run(&mut self) -> Result<()> {
        let start_url = self.config.search.start_url();
        tracing::info!(url = %start_url, "Starting crawl");

        let mut page_url = start_url;
        let mut content = self.fetcher.fetch(&page_url).await?;
        let meta = self
            .parser
            .search_meta(&content, self.config.crawler.ads_per_page)?;

        if meta.ad_count == 0 {
            // Valid "no results for these search parameters" outcome.
            tracing::info!("Search returned no ads, nothing to do");
            return Ok(());
        }
        tracing::info!(
            ads = meta.ad_count,
            pages = meta.page_count,
            "Search results found"
        );

        let mut ctx = RunContext::new(self.config.crawler.max_missed_listings);
        let page_retry = Backoff::fixed(
            self.config.crawler.page_retry_limit,
            Duration::from_millis(self.config.crawler.retry_delay_ms),
        );
        let next_page_retry = Backoff {
            limit: self.config.crawler.next_page_retry_limit,
            base: Duration::from_millis(self.config.crawler.retry_delay_ms),
            exponential: true,
            jitter: false,
        };

        for page in 1..=meta.page_count {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!(page, "Shutdown requested, stopping between pages");
                break;
            }

            self.process_page_with_retry(&page_retry, &page_url, &mut content, page, &mut ctx)
                .await?;
            ctx.pages_processed += 1;
            tracing::info!(page, total = meta.page_count, "Page processed");

            if page < meta.page_count {
                match self.advance(&next_page_retry, &content, page).await {
                    Some((next_url, next_content)) => {
                        page_url = next_url;
                        content = next_content;
                    }
                    None => {
                        tracing::error!(
                            page,
                            "Could not reach the next page, stopping crawl early"
                        );
                        break;
                    }
                }
            }
        }

        tracing::info!(
            pages = ctx.pages_processed,
            saved = ctx.saved,
            skipped = ctx.skipped,
            missed = ctx.missed,
            "Crawl finished"
        );
        Ok(())
    }

    /// Processes one page, retrying with re-fetched content on failure
    ///
    /// Exhausting the retry ceiling abandons the page; the crawl advances
    /// regardless. The missed-listing circuit breaker is the one error that
    /// escapes.
    async fn process_page_with_retry(
        &mut self,
        policy: &Backoff,
        page_url: &str,
        content: &mut String,
        page: u32,
        ctx: &mut RunContext,
    ) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.process_page(content, page, ctx).await {
                Ok(()) => return Ok(()),
                Err(e @ FlatwatchError::MaxMissedListings { .. }) => return Err(e),
                Err(e) => match policy.delay_after(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            page,
                            attempt = attempt + 1,
                            error = %e,
                            "Page failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        match self.fetcher.fetch(page_url).await {
                            Ok(fresh) => *content = fresh,
                            Err(fetch_err) => {
                                tracing::warn!(page, error = %fetch_err, "Page re-fetch failed");
                            }
                        }
                        attempt += 1;
                    }
                    None => {
                        tracing::warn!(page, error = %e, "Abandoning page after retries");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// One attempt at a page: extract, filter, ingest, persist as a batch
    async fn process_page(&mut self, content: &str, page: u32, ctx: &mut RunContext) -> Result<()> {
        let urls = self.parser.listing_urls(content)?;
        let work = self.admit(&urls);
        if work.is_empty() {
            tracing::info!(page, "No new listings on page");
            return Ok(());
        }
        tracing::info!(page, count = work.len(), "Found new or updated listings");

        let listing_delay = Duration::from_millis(self.config.crawler.listing_delay_ms);
        let ingestor = Ingestor::new(&self.fetcher, &self.parser, &self.config.search.base_url);

        let mut records = Vec::new();
        for url in &work {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!(page, "Shutdown requested, stopping between listings");
                break;
            }

            match ingestor.ingest(&mut self.store, ctx, url).await? {
                IngestOutcome::Record(flat) => records.push(flat),
                IngestOutcome::PriceUnchanged => ctx.skipped += 1,
                IngestOutcome::Missed => {}
            }

            tokio::time::sleep(listing_delay).await;
        }

        if !records.is_empty() {
            let saved = self.store.upsert_listings(&records)?;
            ctx.saved += saved;
            tracing::info!(page, saved, total_saved = ctx.saved, "Page batch saved");
        }
        Ok(())
    }

    /// Runs the admission filter over a page's listing URLs
    ///
    /// A URL whose id cannot be derived is queued anyway; the ingestor will
    /// charge it to the miss counter if it really is garbage.
    fn admit(&mut self, urls: &[String]) -> Vec<String> {
        urls.iter()
            .filter(|url| match listing_id(url) {
                Ok(id) => should_ingest(&mut self.store, id),
                Err(_) => {
                    tracing::warn!(url = %url, "Listing URL has no id, queueing anyway");
                    true
                }
            })
            .cloned()
            .collect()
    }

    /// Advances to the next page, retrying with a growing delay
    ///
    /// Returns `None` once the retry ceiling is exhausted: the pagination
    /// link is assumed lost and the crawl should stop early.
    async fn advance(
        &mut self,
        policy: &Backoff,
        content: &str,
        page: u32,
    ) -> Option<(String, String)> {
        let mut attempt = 0;
        loop {
            let result = match self.parser.next_page_url(content) {
                Ok(next_url) => match self.fetcher.fetch(&next_url).await {
                    Ok(next_content) => return Some((next_url, next_content)),
                    Err(e) => FlatwatchError::from(e),
                },
                Err(e) => FlatwatchError::from(e),
            };

            match policy.delay_after(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        page,
                        attempt = attempt + 1,
                        error = %result,
                        "Failed to advance to next page, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    tracing::error!(page, error = %result, "Next-page retries exhausted");
                    return None;
                }
            }
        }
    }
}
