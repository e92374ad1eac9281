//! Database schema definitions
//!
//! The notification front-end reads these tables directly, so the shape is a
//! contract: `flats` keyed by listing id, `prices` append-only keyed by
//! (flat_id, date).

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Listing metadata, one row per listing, upserted by id
CREATE TABLE IF NOT EXISTS flats (
    id INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    rooms INTEGER,
    area INTEGER,
    city TEXT,
    lat REAL,
    lon REAL,
    description TEXT,
    photo TEXT,
    address TEXT,
    title TEXT NOT NULL,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL
);

-- Append-only price history, at most one observation per listing per day
CREATE TABLE IF NOT EXISTS prices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flat_id INTEGER NOT NULL REFERENCES flats(id),
    date TEXT NOT NULL,
    price INTEGER NOT NULL,
    market_percent REAL NOT NULL DEFAULT 0,
    UNIQUE(flat_id, date)
);

CREATE INDEX IF NOT EXISTS idx_prices_flat_date ON prices(flat_id, date);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["flats", "prices"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_price_unique_per_day() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO flats (id, url, title, first_seen, last_seen)
             VALUES (1, 'u', 't', 'now', 'now')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO prices (flat_id, date, price) VALUES (1, '2026-08-29', 100)",
            [],
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO prices (flat_id, date, price) VALUES (1, '2026-08-29', 200)",
            [],
        );
        assert!(dup.is_err());
    }
}
