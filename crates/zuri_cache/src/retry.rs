//! Bounded exponential backoff for transient store failures.

use std::time::Duration;

use crate::error::{CacheError, StoreError};

/// How transient store failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves like one.
    pub attempts: u32,
    /// Sleep before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single sleep.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// The sleep after failed attempt `n` (1-based).
    pub fn backoff(&self, n: u32) -> Duration {
        let factor = 1u32.checked_shl(n.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Runs `op` until it succeeds, fails permanently or runs out of
    /// attempts.
    pub fn run<T>(
        &self,
        operation: &str,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, CacheError> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let sleep = self.backoff(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        error = %err,
                        backoff_ms = sleep.as_millis() as u64,
                        "retrying store operation"
                    );
                    std::thread::sleep(sleep);
                    attempt += 1;
                }
                Err(err) => return Err(CacheError::from_store(err, attempt)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable() -> StoreError {
        StoreError::Unavailable {
            reason: "busy".to_string(),
        }
    }

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            attempts: 10,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(35),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(35));
        assert_eq!(policy.backoff(40), Duration::from_millis(35));
    }

    #[test]
    fn transient_errors_are_retried() {
        let mut failures = 2;
        let value = fast(3)
            .run("get", || {
                if failures > 0 {
                    failures -= 1;
                    Err(unavailable())
                } else {
                    Ok(7)
                }
            })
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn exhausted_retries_surface_as_unavailable() {
        let mut calls = 0;
        let err = fast(3)
            .run::<()>("put", || {
                calls += 1;
                Err(unavailable())
            })
            .unwrap_err();
        assert_eq!(calls, 3);
        assert_eq!(
            err,
            CacheError::StoreUnavailable {
                attempts: 3,
                reason: "busy".to_string()
            }
        );
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let mut calls = 0;
        let err = fast(5)
            .run::<()>("get", || {
                calls += 1;
                Err(StoreError::Corrupt {
                    reason: "bad".to_string(),
                })
            })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, CacheError::Store(StoreError::Corrupt { .. })));
    }
}
