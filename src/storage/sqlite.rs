//! SQLite storage implementation
//!
//! Writes are chunked into bounded batches, each in its own transaction, so
//! lock hold time stays short. Contention retries with jittered exponential
//! backoff; a connectivity-class failure reopens the connection first. A
//! batch that still fails after the attempt ceiling is abandoned and the run
//! continues with the next one.

use crate::config::StorageConfig;
use crate::retry::Backoff;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Store, StoreError, StoreResult};
use crate::storage::Flat;
use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Delay after the first contended batch attempt; doubles with jitter from
/// there
const WRITE_RETRY_BASE: Duration = Duration::from_millis(100);

/// Delay shape for connection reopen attempts
const RECONNECT_BASE: Duration = Duration::from_secs(2);
const RECONNECT_LIMIT: u32 = 3;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
    /// None for in-memory test stores, which cannot be reopened
    path: Option<PathBuf>,
    batch_size: usize,
    write_retry: Backoff,
}

impl SqliteStore {
    /// Opens (or creates) the database configured in `config`
    pub fn new(config: &StorageConfig) -> StoreResult<Self> {
        let path = PathBuf::from(&config.database_path);
        let conn = open_connection(&path)?;
        Ok(Self {
            conn,
            path: Some(path),
            batch_size: config.batch_size,
            write_retry: Backoff::exponential_jitter(config.write_retry_limit, WRITE_RETRY_BASE),
        })
    }

    /// Creates an in-memory store (for testing)
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            path: None,
            batch_size: 50,
            write_retry: Backoff::exponential_jitter(5, Duration::from_millis(10)),
        })
    }

    /// Writes one batch inside a single transaction
    ///
    /// A listing's metadata and its price row commit together or not at all.
    fn write_batch(&mut self, batch: &[Flat]) -> StoreResult<usize> {
        // Same clock as the price observation dates.
        let now = Local::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        for flat in batch {
            tx.execute(
                "INSERT INTO flats
                     (id, url, rooms, area, city, lat, lon, description, photo,
                      address, title, first_seen, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
                 ON CONFLICT(id) DO UPDATE SET
                     url = excluded.url,
                     rooms = excluded.rooms,
                     area = excluded.area,
                     city = excluded.city,
                     lat = excluded.lat,
                     lon = excluded.lon,
                     description = excluded.description,
                     photo = excluded.photo,
                     address = excluded.address,
                     title = excluded.title,
                     last_seen = excluded.last_seen",
                params![
                    flat.id,
                    flat.url,
                    flat.rooms,
                    flat.area,
                    flat.city,
                    flat.lat,
                    flat.lon,
                    flat.description,
                    flat.photo,
                    flat.address,
                    flat.title,
                    now,
                ],
            )?;

            tx.execute(
                "INSERT INTO prices (flat_id, date, price, market_percent)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(flat_id, date) DO UPDATE SET
                     price = excluded.price,
                     market_percent = excluded.market_percent",
                params![
                    flat.id,
                    flat.observed_on.to_string(),
                    flat.price,
                    flat.market_percent,
                ],
            )?;
        }

        tx.commit()?;
        Ok(batch.len())
    }

    /// Retries one batch under the write backoff policy
    fn write_batch_with_retry(&mut self, batch: &[Flat]) -> StoreResult<usize> {
        let mut attempt = 0;
        loop {
            match self.write_batch(batch) {
                Ok(n) => return Ok(n),
                Err(e) if e.is_contention() || e.is_connectivity() => {
                    if e.is_connectivity() {
                        tracing::warn!(error = %e, "Connectivity failure, reconnecting");
                        self.reconnect()?;
                    }
                    match self.write_retry.delay_after(attempt) {
                        Some(delay) => {
                            tracing::warn!(
                                attempt = attempt + 1,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                "Batch write contended, retrying"
                            );
                            std::thread::sleep(delay);
                            attempt += 1;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Store for SqliteStore {
    fn upsert_listings(&mut self, records: &[Flat]) -> StoreResult<usize> {
        let mut saved = 0;
        for batch in records.chunks(self.batch_size) {
            match self.write_batch_with_retry(batch) {
                Ok(n) => saved += n,
                Err(e) => {
                    // Abandon this batch, keep the rest of the run going.
                    tracing::error!(size = batch.len(), error = %e, "Batch abandoned");
                }
            }
        }
        if saved < records.len() {
            tracing::warn!(saved, total = records.len(), "Partial batch success");
        }
        Ok(saved)
    }

    fn latest_price(&self, flat_id: i64) -> StoreResult<Option<i64>> {
        let price = self
            .conn
            .query_row(
                "SELECT price FROM prices WHERE flat_id = ?1 ORDER BY date DESC LIMIT 1",
                params![flat_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(price)
    }

    fn reconnect(&mut self) -> StoreResult<()> {
        let Some(path) = self.path.clone() else {
            // In-memory stores have nothing to reopen.
            return Ok(());
        };

        let policy = Backoff {
            limit: RECONNECT_LIMIT,
            base: RECONNECT_BASE,
            exponential: true,
            jitter: false,
        };
        let conn = policy.run_blocking(
            || {
                tracing::info!(path = %path.display(), "Reopening database connection");
                open_connection(&path)
            },
            |_| true,
        )?;
        self.conn = conn;
        tracing::info!("Database reconnection successful");
        Ok(())
    }
}

/// Opens a connection with the crawl's pragmas and an initialized schema
///
/// No busy handler is installed: contention is handled by the batch retry
/// policy above.
fn open_connection(path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
    ",
    )?;
    initialize_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_flat(id: i64, price: i64) -> Flat {
        Flat {
            id,
            url: format!("https://krisha.kz/a/show/{}", id),
            rooms: Some(2),
            area: Some(60),
            city: Some("Алматы".to_string()),
            lat: Some(43.2),
            lon: Some(76.9),
            description: Some("desc".to_string()),
            photo: None,
            address: Some("Абая 10".to_string()),
            title: "2-комнатная квартира".to_string(),
            price,
            market_percent: 5.0,
            observed_on: NaiveDate::from_ymd_opt(2026, 8, 29).unwrap(),
        }
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    #[test]
    fn test_upsert_inserts_listing_and_price() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let saved = store.upsert_listings(&[sample_flat(1, 100)]).unwrap();
        assert_eq!(saved, 1);
        assert_eq!(count(&store.conn, "flats"), 1);
        assert_eq!(count(&store.conn, "prices"), 1);
        assert_eq!(store.latest_price(1).unwrap(), Some(100));
    }

    #[test]
    fn test_upsert_same_batch_twice_is_idempotent() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let records: Vec<Flat> = (1..=20).map(|id| sample_flat(id, id * 10)).collect();

        store.upsert_listings(&records).unwrap();
        store.upsert_listings(&records).unwrap();

        assert_eq!(count(&store.conn, "flats"), 20);
        assert_eq!(count(&store.conn, "prices"), 20);
    }

    #[test]
    fn test_same_day_price_last_write_wins() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.upsert_listings(&[sample_flat(1, 100)]).unwrap();
        store.upsert_listings(&[sample_flat(1, 90)]).unwrap();

        assert_eq!(count(&store.conn, "prices"), 1);
        assert_eq!(store.latest_price(1).unwrap(), Some(90));
    }

    #[test]
    fn test_new_day_appends_price_row() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.upsert_listings(&[sample_flat(1, 100)]).unwrap();

        let mut later = sample_flat(1, 95);
        later.observed_on = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        store.upsert_listings(&[later]).unwrap();

        assert_eq!(count(&store.conn, "flats"), 1);
        assert_eq!(count(&store.conn, "prices"), 2);
        assert_eq!(store.latest_price(1).unwrap(), Some(95));
    }

    #[test]
    fn test_metadata_upsert_keeps_single_row() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.upsert_listings(&[sample_flat(1, 100)]).unwrap();

        let mut updated = sample_flat(1, 100);
        updated.title = "Updated title".to_string();
        store.upsert_listings(&[updated]).unwrap();

        let title: String = store
            .conn
            .query_row("SELECT title FROM flats WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(title, "Updated title");
        assert_eq!(count(&store.conn, "flats"), 1);
    }

    #[test]
    fn test_first_seen_survives_update_last_seen_moves() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.upsert_listings(&[sample_flat(1, 100)]).unwrap();

        let seen = |store: &SqliteStore| -> (String, String) {
            store
                .conn
                .query_row(
                    "SELECT first_seen, last_seen FROM flats WHERE id = 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .unwrap()
        };
        let (first_before, _) = seen(&store);

        std::thread::sleep(Duration::from_millis(5));
        store.upsert_listings(&[sample_flat(1, 90)]).unwrap();

        let (first_after, last_after) = seen(&store);
        assert_eq!(first_after, first_before);
        assert!(last_after > first_after);
    }

    #[test]
    fn test_latest_price_absent_listing() {
        let store = SqliteStore::new_in_memory().unwrap();
        assert_eq!(store.latest_price(999).unwrap(), None);
    }

    #[test]
    fn test_batches_are_chunked() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.batch_size = 7;
        let records: Vec<Flat> = (1..=20).map(|id| sample_flat(id, 10)).collect();
        let saved = store.upsert_listings(&records).unwrap();
        assert_eq!(saved, 20);
        assert_eq!(count(&store.conn, "flats"), 20);
    }

    #[test]
    fn test_write_retry_outlasts_held_lock() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("flats.db");
        let config = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            batch_size: 50,
            write_retry_limit: 6,
        };
        let mut store = SqliteStore::new(&config).unwrap();

        // A second connection holds the write lock for a while, producing
        // SQLITE_BUSY on the store's first attempts.
        let blocker = open_connection(&db_path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE;").unwrap();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(250));
            blocker.execute_batch("COMMIT;").unwrap();
        });

        let records: Vec<Flat> = (1..=20).map(|id| sample_flat(id, 10)).collect();
        let saved = store.upsert_listings(&records).unwrap();
        handle.join().unwrap();

        assert_eq!(saved, 20);
        assert_eq!(count(&store.conn, "flats"), 20);
        assert_eq!(count(&store.conn, "prices"), 20);
    }

    #[test]
    fn test_reconnect_reopens_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("flats.db");
        let config = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            batch_size: 50,
            write_retry_limit: 3,
        };
        let mut store = SqliteStore::new(&config).unwrap();
        store.upsert_listings(&[sample_flat(1, 100)]).unwrap();

        store.reconnect().unwrap();
        assert_eq!(store.latest_price(1).unwrap(), Some(100));
    }
}
