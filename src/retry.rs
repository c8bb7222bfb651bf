use serde::Deserialize;
use std::thread;
use std::time::Duration;
use tracing::warn;

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

pub trait BackoffPolicy {
    fn delay_for_attempt(&self, attempt: usize) -> Duration;
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff_ms: 500,
        }
    }
}

impl BackoffPolicy for RetryPolicy {
    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(attempt as u64))
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails with a non-transient error, or
    /// `max_attempts` is used up. The last error is returned.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        action = "retry",
                        component = "retry",
                        operation = what,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Transient failure, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RollupError;

    fn fast(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff_ms: 0,
        }
    }

    #[test]
    fn backoff_is_linear() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 100,
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(300));
    }

    #[test]
    fn retries_transient_until_success() {
        let mut calls = 0;
        let value = fast(3)
            .run("op", || {
                calls += 1;
                if calls < 3 {
                    Err(RollupError::upstream("es", "503"))
                } else {
                    Ok(calls)
                }
            })
            .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<()> = fast(2).run("op", || {
            calls += 1;
            Err(RollupError::upstream("es", "timeout"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn rejected_credentials_are_not_retried() {
        let mut calls = 0;
        let result: Result<()> = fast(5).run("op", || {
            calls += 1;
            Err(RollupError::upstream_status("es", 401, "status 401 Unauthorized"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn rate_limiting_is_retried() {
        let mut calls = 0;
        let result: Result<()> = fast(3).run("op", || {
            calls += 1;
            Err(RollupError::upstream_status("es", 429, "status 429 Too Many Requests"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn parse_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<()> = fast(5).run("op", || {
            calls += 1;
            Err(RollupError::Parse("bad body".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
