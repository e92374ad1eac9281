//! Configuration loading and validation
//!
//! Configuration is a TOML file with kebab-case keys. Loading runs the
//! validation pass before the config is handed to the rest of the crate.

mod parser;
mod types;
mod validation;

pub use parser::load_config;
pub use types::{Config, CrawlerConfig, FetchConfig, SearchConfig, StorageConfig};
pub use validation::validate;
