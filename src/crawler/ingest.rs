//! Admission filtering and per-listing ingestion
//!
//! A listing is fetched in full only when the store has never priced it
//! (admission) or when its detail-page price differs from the latest stored
//! observation (the unchanged-price skip). Fetch and parse failures count
//! against the run's missed-listing ceiling rather than killing the run
//! outright.

use crate::crawler::RunContext;
use crate::fetch::{Fetcher, PRICE_ANALYSIS_PATH};
use crate::parse::{PageParser, ParseError};
use crate::storage::{Flat, Store};
use crate::{FlatwatchError, Result};
use chrono::Local;

/// Derives the stable numeric identifier from a listing URL
///
/// The id is the last path segment with any query string stripped:
/// `https://krisha.kz/a/show/682104505?src=search` -> `682104505`.
pub fn listing_id(url: &str) -> Result<i64> {
    url.rsplit('/')
        .next()
        .and_then(|segment| segment.split('?').next())
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| FlatwatchError::BadListingUrl(url.to_string()))
}

/// Admission filter: must this listing be fetched in full?
///
/// True when the store has no price observation for the id. Fails open: a
/// lookup error queues the listing rather than silently dropping it, and a
/// connectivity-class error additionally triggers a reconnect attempt so
/// later lookups and writes get a usable connection.
pub fn should_ingest<S: Store>(store: &mut S, flat_id: i64) -> bool {
    match store.latest_price(flat_id) {
        Ok(price) => price.is_none(),
        Err(e) => {
            tracing::warn!(flat_id, error = %e, "Price lookup failed, queueing listing anyway");
            if e.is_connectivity() {
                if let Err(re) = store.reconnect() {
                    tracing::warn!(error = %re, "Reconnect failed");
                }
            }
            true
        }
    }
}

/// Outcome of ingesting one listing
#[derive(Debug)]
pub enum IngestOutcome {
    /// A record ready for the page batch
    Record(Flat),

    /// The stored price matches the page; nothing to write
    PriceUnchanged,

    /// Fetch or parse failed below the miss ceiling; listing skipped
    Missed,
}

/// Per-listing ingestion workflow
pub struct Ingestor<'a, P> {
    pub fetcher: &'a Fetcher,
    pub parser: &'a P,
    /// Scheme + host used to build the price-analysis URL
    pub base_url: &'a str,
}

impl<'a, P: PageParser> Ingestor<'a, P> {
    pub fn new(fetcher: &'a Fetcher, parser: &'a P, base_url: &'a str) -> Self {
        Self {
            fetcher,
            parser,
            base_url,
        }
    }

    /// Ingests one listing URL
    ///
    /// Fetch and structural-parse failures are converted to
    /// `IngestOutcome::Missed` and charged to the run context; the error
    /// surfaces only as `MaxMissedListings` once the ceiling is passed.
    pub async fn ingest<S: Store>(
        &self,
        store: &mut S,
        ctx: &mut RunContext,
        url: &str,
    ) -> Result<IngestOutcome> {
        match self.try_ingest(store, url).await {
            Ok(outcome) => Ok(outcome),
            Err(e @ FlatwatchError::MaxMissedListings { .. }) => Err(e),
            Err(e) => {
                ctx.record_miss()?;
                tracing::warn!(
                    url,
                    error = %e,
                    missed = ctx.missed,
                    limit = ctx.missed_limit,
                    "Skipping listing"
                );
                Ok(IngestOutcome::Missed)
            }
        }
    }

    async fn try_ingest<S: Store>(&self, store: &mut S, url: &str) -> Result<IngestOutcome> {
        let id = listing_id(url)?;

        // Two independent fetches, both under the retry schedule.
        let analysis_url = format!("{}{}{}", self.base_url, PRICE_ANALYSIS_PATH, id);
        let analysis_doc = self.fetcher.fetch(&analysis_url).await?;
        let detail_doc = self.fetcher.fetch(url).await?;

        let price = self
            .parser
            .listing_price(&detail_doc)
            .ok_or_else(|| ParseError::ElementNotFound("offer__price".to_string()))?;

        // Fail open on lookup errors: a missing comparison point means we
        // ingest rather than drop.
        let stored = match store.latest_price(id) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(flat_id = id, error = %e, "Price comparison lookup failed");
                None
            }
        };
        if stored == Some(price) {
            tracing::debug!(flat_id = id, price, "Price unchanged");
            return Ok(IngestOutcome::PriceUnchanged);
        }

        let fields = self.parser.listing_fields(&detail_doc)?;
        let market_percent = self.parser.market_percent(&analysis_doc);

        Ok(IngestOutcome::Record(Flat {
            id,
            url: url.to_string(),
            rooms: fields.rooms,
            area: fields.area,
            city: fields.city,
            lat: fields.lat,
            lon: fields.lon,
            description: fields.description,
            photo: fields.photo,
            address: fields.address,
            title: fields.title,
            price,
            market_percent,
            observed_on: Local::now().date_naive(),
        }))
    }
}
