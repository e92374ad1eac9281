//! Persistence layer
//!
//! Listings and their price history live in SQLite. The crawler core talks
//! to the [`Store`] trait only, so tests can substitute fakes and the
//! notification front-end can read the same schema independently.

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteStore;
pub use traits::{Store, StoreError, StoreResult};

use chrono::NaiveDate;

/// A normalized listing record, ready for persistence
///
/// One record carries both the metadata snapshot (upserted by id) and the
/// price observation for the day it was ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct Flat {
    /// Stable numeric identifier from the listing's canonical URL
    pub id: i64,
    /// External reference URL
    pub url: String,
    pub rooms: Option<u32>,
    /// Floor area in square meters
    pub area: Option<u32>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub description: Option<String>,
    pub photo: Option<String>,
    pub address: Option<String>,
    pub title: String,
    /// Price in integer currency units
    pub price: i64,
    /// Percent below market from the price-analysis document, 0.0 if absent
    pub market_percent: f64,
    /// Calendar day of the observation
    pub observed_on: NaiveDate,
}
