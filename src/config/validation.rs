//! Configuration validation
//!
//! Catches nonsensical settings before a crawl starts instead of failing
//! somewhere in the middle of a run.

use crate::config::Config;
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Validates a loaded configuration
///
/// # Errors
///
/// Returns `ConfigError::Validation` with a human-readable message for the
/// first problem found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    if config.fetch.retry_delays.is_empty() {
        return Err(ConfigError::Validation(
            "fetch.retry-delays must contain at least one delay slot".to_string(),
        ));
    }

    if config.fetch.timeout == 0 {
        return Err(ConfigError::Validation(
            "fetch.timeout must be at least 1 second".to_string(),
        ));
    }

    if config.fetch.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "fetch.user-agent must not be empty".to_string(),
        ));
    }

    if config.crawler.ads_per_page == 0 {
        return Err(ConfigError::Validation(
            "crawler.ads-per-page must be at least 1".to_string(),
        ));
    }

    if config.crawler.page_retry_limit == 0 {
        return Err(ConfigError::Validation(
            "crawler.page-retry-limit must be at least 1".to_string(),
        ));
    }

    if config.crawler.next_page_retry_limit == 0 {
        return Err(ConfigError::Validation(
            "crawler.next-page-retry-limit must be at least 1".to_string(),
        ));
    }

    let base = Url::parse(&config.search.base_url).map_err(|e| {
        ConfigError::Validation(format!(
            "search.base-url is not a valid URL ({}): {}",
            config.search.base_url, e
        ))
    })?;
    if base.host_str().is_none() {
        return Err(ConfigError::Validation(format!(
            "search.base-url has no host: {}",
            config.search.base_url
        )));
    }

    if !config.search.path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "search.path must start with '/': {}",
            config.search.path
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "storage.database-path must not be empty".to_string(),
        ));
    }

    if config.storage.batch_size == 0 {
        return Err(ConfigError::Validation(
            "storage.batch-size must be at least 1".to_string(),
        ));
    }

    if config.storage.write_retry_limit == 0 {
        return Err(ConfigError::Validation(
            "storage.write-retry-limit must be at least 1".to_string(),
        ));
    }

    Ok(())
}
