//! Storage trait and error types

use crate::storage::Flat;
use rusqlite::ffi::ErrorCode;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl StoreError {
    /// Whether this is a write-contention error worth retrying in place
    /// (SQLITE_BUSY / SQLITE_LOCKED class)
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked
        )
    }

    /// Whether this looks like a lost or unusable connection, warranting a
    /// reconnect before the next attempt
    pub fn is_connectivity(&self) -> bool {
        match self {
            StoreError::Connection(_) => true,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::DiskFull
            ),
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for the persistence backend used by the crawl
///
/// One logical writer (the current crawl run) uses the store at a time;
/// batch transactions are the unit of isolation.
pub trait Store {
    /// Upserts listing metadata and the day's price observation for each
    /// record, in bounded batches
    ///
    /// Returns the number of records durably written. Batches that keep
    /// failing after bounded retries are abandoned and logged; partial
    /// success is acceptable, so an `Ok` count may be lower than the input
    /// length.
    fn upsert_listings(&mut self, records: &[Flat]) -> StoreResult<usize>;

    /// The most recent price observation for a listing, if any
    fn latest_price(&self, flat_id: i64) -> StoreResult<Option<i64>>;

    /// Re-establishes the underlying connection after a connectivity failure
    fn reconnect(&mut self) -> StoreResult<()>;
}
