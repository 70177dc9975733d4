//! Bounded retry policy for network calls
//!
//! All collector network calls share one policy: a fixed number of
//! attempts with a fixed delay between them. Only transient failures
//! are retried; anything else fails immediately.

use crate::error::{Error, Result};
use std::time::Duration;

/// Fixed-delay bounded retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: usize,
    /// Delay between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds, fails non-transiently, or attempts
    /// are exhausted. The last transient error is returned on
    /// exhaustion.
    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tracing::debug!(
                    what,
                    attempt,
                    max_attempts = self.max_attempts,
                    delay = ?self.delay,
                    "Retrying after delay"
                );
                std::thread::sleep(self.delay);
            }

            match op() {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) => {
                    tracing::warn!(what, attempt, error = %e, "Transient failure");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Api(format!("{}: max retries exceeded", what))))
    }
}

/// Check if an error is retryable (transient)
fn is_retryable(error: &Error) -> bool {
    match error {
        Error::Api(msg) => {
            // Retry on 5xx responses and network-level failures
            msg.contains("(5")
                || msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("request failed")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn quick_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_succeeds_first_attempt() {
        let calls = Cell::new(0);
        let result = quick_policy(3).run("op", || {
            calls.set(calls.get() + 1);
            Ok(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_retries_transient_then_succeeds() {
        let calls = Cell::new(0);
        let result = quick_policy(3).run("op", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(Error::Api("request failed: connection reset".to_string()))
            } else {
                Ok("done")
            }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_exhausts_attempts() {
        let calls = Cell::new(0);
        let result: Result<()> = quick_policy(3).run("op", || {
            calls.set(calls.get() + 1);
            Err(Error::Api("response (503): unavailable".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_non_retryable_fails_immediately() {
        let calls = Cell::new(0);
        let result: Result<()> = quick_policy(3).run("op", || {
            calls.set(calls.get() + 1);
            Err(Error::Api("response (401): unauthorized".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&Error::Api(
            "response (500): internal error".to_string()
        )));
        assert!(is_retryable(&Error::Api(
            "request failed: timeout".to_string()
        )));
        assert!(!is_retryable(&Error::Api(
            "response (400): bad request".to_string()
        )));
        assert!(!is_retryable(&Error::Pipeline("missing artifact".to_string())));
    }
}
