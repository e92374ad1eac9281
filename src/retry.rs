//! Retry policy shared across layers
//!
//! The page loop, the batch writer, and the reconnect path all retry with
//! some flavor of backoff. Instead of duplicating ad-hoc loops, each layer
//! holds a [`Backoff`] describing its attempt ceiling and delay shape and
//! asks it for the delay after a given failed attempt.

use rand::Rng;
use std::time::Duration;

/// A bounded backoff policy
///
/// `delay_after(attempt)` returns the delay to sleep after the given
/// zero-based failed attempt, or `None` once the attempt ceiling is reached
/// and the operation should be given up.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Maximum number of attempts before giving up
    pub limit: u32,

    /// Delay after the first failed attempt
    pub base: Duration,

    /// Whether the delay doubles with each attempt
    pub exponential: bool,

    /// Whether up to 100ms of random jitter is added to each delay
    pub jitter: bool,
}

impl Backoff {
    /// Fixed delay between attempts, no jitter
    pub fn fixed(limit: u32, base: Duration) -> Self {
        Self {
            limit,
            base,
            exponential: false,
            jitter: false,
        }
    }

    /// Exponentially growing delay with random jitter
    pub fn exponential_jitter(limit: u32, base: Duration) -> Self {
        Self {
            limit,
            base,
            exponential: true,
            jitter: true,
        }
    }

    /// Delay to sleep after failed attempt `attempt` (zero-based)
    ///
    /// Returns `None` when the ceiling is exhausted. The last attempt gets
    /// no delay: there is nothing left to wait for.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.limit {
            return None;
        }

        let mut delay = if self.exponential {
            self.base.saturating_mul(1u32 << attempt.min(16))
        } else {
            self.base
        };

        if self.jitter {
            let extra = rand::thread_rng().gen_range(0..100);
            delay += Duration::from_millis(extra);
        }

        Some(delay)
    }

    /// Runs a blocking operation under this policy
    ///
    /// Retries `op` while `is_retryable` holds for the error, sleeping on the
    /// current thread between attempts. Used by the synchronous storage
    /// layer; async callers drive `delay_after` with their own sleeps.
    pub fn run_blocking<T, E>(
        &self,
        mut op: impl FnMut() -> std::result::Result<T, E>,
        is_retryable: impl Fn(&E) -> bool,
    ) -> std::result::Result<T, E> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) => match self.delay_after(attempt) {
                    Some(delay) => {
                        std::thread::sleep(delay);
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_is_constant() {
        let policy = Backoff::fixed(4, Duration::from_millis(50));
        assert_eq!(policy.delay_after(0), Some(Duration::from_millis(50)));
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(50)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_ceiling_exhausts() {
        let policy = Backoff::fixed(3, Duration::from_millis(10));
        assert!(policy.delay_after(0).is_some());
        assert!(policy.delay_after(1).is_some());
        assert_eq!(policy.delay_after(2), None);
    }

    #[test]
    fn test_single_attempt_never_sleeps() {
        let policy = Backoff::fixed(1, Duration::from_secs(10));
        assert_eq!(policy.delay_after(0), None);
    }

    #[test]
    fn test_exponential_growth() {
        let policy = Backoff {
            limit: 5,
            base: Duration::from_millis(100),
            exponential: true,
            jitter: false,
        };
        assert_eq!(policy.delay_after(0), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(400)));
    }

    #[test]
    fn test_jitter_stays_bounded() {
        let policy = Backoff::exponential_jitter(3, Duration::from_millis(100));
        let delay = policy.delay_after(0).unwrap();
        assert!(delay >= Duration::from_millis(100));
        assert!(delay < Duration::from_millis(200));
    }

    #[test]
    fn test_run_blocking_retries_then_succeeds() {
        let policy = Backoff::fixed(3, Duration::from_millis(1));
        let mut calls = 0;
        let result: Result<u32, &str> = policy.run_blocking(
            || {
                calls += 1;
                if calls < 3 {
                    Err("busy")
                } else {
                    Ok(42)
                }
            },
            |_| true,
        );
        assert_eq!(result, Ok(42));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_run_blocking_gives_up_at_ceiling() {
        let policy = Backoff::fixed(2, Duration::from_millis(1));
        let mut calls = 0;
        let result: Result<u32, &str> = policy.run_blocking(
            || {
                calls += 1;
                Err("busy")
            },
            |_| true,
        );
        assert_eq!(result, Err("busy"));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_run_blocking_does_not_retry_fatal_errors() {
        let policy = Backoff::fixed(5, Duration::from_millis(1));
        let mut calls = 0;
        let result: Result<u32, &str> = policy.run_blocking(
            || {
                calls += 1;
                Err("fatal")
            },
            |e| *e == "busy",
        );
        assert_eq!(result, Err("fatal"));
        assert_eq!(calls, 1);
    }
}
