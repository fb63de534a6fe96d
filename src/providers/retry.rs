//! Exponential backoff for remote provider calls.

use crate::config::RetryConfig;
use crate::error::{BonsaiError, BonsaiResult};
use std::time::Duration;
use tracing::{debug, warn};

/// Retry schedule: `multiplier * 2^n` seconds before retry `n`, clamped to
/// `[min_wait, max_wait]`, for at most `max_tries` attempts in total
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    multiplier: f64,
    min_wait: Duration,
    max_wait: Duration,
    max_tries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            min_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(60),
            max_tries: 10,
        }
    }
}

impl RetryPolicy {
    /// Build a policy from validated settings
    pub fn from_config(config: &RetryConfig) -> BonsaiResult<Self> {
        config.validate()?;
        Ok(Self {
            multiplier: config.multiplier,
            min_wait: config.min_wait(),
            max_wait: config.max_wait(),
            max_tries: config.max_tries,
        })
    }

    /// Retry immediately, up to `max_tries` attempts
    pub fn immediate(max_tries: u32) -> Self {
        Self {
            multiplier: 0.0,
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
            max_tries: max_tries.max(1),
        }
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    /// Wait before retry `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = 2f64.powi(retry.min(62) as i32);
        let secs = self.multiplier * exp;
        let delay = if secs.is_finite() {
            Duration::try_from_secs_f64(secs).unwrap_or(self.max_wait)
        } else {
            self.max_wait
        };
        delay.clamp(self.min_wait, self.max_wait)
    }

    /// Run `call`, retrying transient failures
    ///
    /// Errors that [`BonsaiError::is_retryable`] rejects are returned as-is on
    /// the first occurrence. Once every attempt has failed the last error is
    /// wrapped in [`BonsaiError::RetriesExhausted`].
    pub fn run<T, F>(&self, operation: &str, mut call: F) -> BonsaiResult<T>
    where
        F: FnMut() -> BonsaiResult<T>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = %operation, attempt = attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= self.max_tries => {
                    return Err(BonsaiError::RetriesExhausted {
                        attempts: attempt,
                        last_error: err.to_string(),
                    });
                }
                Err(err) => {
                    let delay = self.delay_for(attempt - 1);
                    warn!(
                        operation = %operation,
                        attempt = attempt,
                        max_tries = self.max_tries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient provider failure; retrying"
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }
}
