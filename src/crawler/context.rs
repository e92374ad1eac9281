//! Per-run mutable state
//!
//! Counters live in an explicit context threaded through the crawl instead
//! of module globals, so parallel test runs cannot interfere.

use crate::{FlatwatchError, Result};

/// State shared across one crawl run
#[derive(Debug)]
pub struct RunContext {
    /// Listings that could not be fetched or parsed this run
    pub missed: u32,

    /// Missed-listing ceiling; exceeding it aborts the run
    pub missed_limit: u32,

    /// Listings skipped because their price was unchanged
    pub skipped: u32,

    /// Records durably written
    pub saved: usize,

    /// Pages fully processed
    pub pages_processed: u32,
}

impl RunContext {
    pub fn new(missed_limit: u32) -> Self {
        Self {
            missed: 0,
            missed_limit,
            skipped: 0,
            saved: 0,
            pages_processed: 0,
        }
    }

    /// Records one missed listing
    ///
    /// # Errors
    ///
    /// `FlatwatchError::MaxMissedListings` once the counter passes the
    /// ceiling - the circuit breaker against a systematically unreachable
    /// source.
    pub fn record_miss(&mut self) -> Result<()> {
        self.missed += 1;
        if self.missed > self.missed_limit {
            return Err(FlatwatchError::MaxMissedListings {
                missed: self.missed,
                limit: self.missed_limit,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_misses_below_ceiling_are_ok() {
        let mut ctx = RunContext::new(3);
        assert!(ctx.record_miss().is_ok());
        assert!(ctx.record_miss().is_ok());
        assert!(ctx.record_miss().is_ok());
        assert_eq!(ctx.missed, 3);
    }

    #[test]
    fn test_exceeding_ceiling_aborts() {
        let mut ctx = RunContext::new(2);
        ctx.record_miss().unwrap();
        ctx.record_miss().unwrap();
        let err = ctx.record_miss().unwrap_err();
        assert!(matches!(
            err,
            FlatwatchError::MaxMissedListings { missed: 3, limit: 2 }
        ));
    }

    #[test]
    fn test_zero_ceiling_aborts_on_first_miss() {
        let mut ctx = RunContext::new(0);
        assert!(ctx.record_miss().is_err());
    }
}
