//! Flatwatch: an incremental real-estate listing harvester
//!
//! This crate crawls a paginated flat-listing search source, detects listings
//! that are new or whose observable price changed, and persists normalized
//! records with an append-only price history.

pub mod config;
pub mod crawler;
pub mod fetch;
pub mod parse;
pub mod retry;
pub mod storage;

use thiserror::Error;

/// Main error type for Flatwatch operations
#[derive(Debug, Error)]
pub enum FlatwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] parse::ParseError),

    #[error("Storage error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Listing URL has no numeric identifier: {0}")]
    BadListingUrl(String),

    #[error("Missed {missed} listings, over the configured limit of {limit}")]
    MaxMissedListings { missed: u32, limit: u32 },
}

/// Result type alias for Flatwatch operations
pub type Result<T> = std::result::Result<T, FlatwatchError>;

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Crawler;
pub use parse::{KrishaParser, PageParser};
pub use storage::{Flat, SqliteStore, Store};
