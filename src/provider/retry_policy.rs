//! Retry and backoff policy for provider requests.
//!
//! Transient failures back off exponentially; rate-limit waits follow the
//! provider's `Retry-After` hint up to a ceiling.

use crate::config::RetrySettings;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per request for transient failures, including the first.
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    pub backoff_multiplier: f64,
    /// Cap for exponential growth.
    pub max_backoff_secs: u64,
    /// Longest `Retry-After` we will sleep through; anything longer aborts.
    pub rate_limit_ceiling_secs: u64,
    /// Wait used when a 429 carries no usable `Retry-After`.
    pub default_retry_after_secs: u64,
}

impl RetryPolicy {
    pub fn new(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_backoff_secs: settings.initial_backoff_secs,
            backoff_multiplier: settings.backoff_multiplier,
            max_backoff_secs: settings.max_backoff_secs,
            rate_limit_ceiling_secs: settings.rate_limit_ceiling_secs,
            default_retry_after_secs: settings.default_retry_after_secs,
        }
    }

    /// Backoff before retry number `retry_count` (0-based):
    /// `initial * multiplier^retry_count`, capped at `max_backoff_secs`.
    pub fn backoff_secs(&self, retry_count: u32) -> u64 {
        let backoff =
            self.initial_backoff_secs as f64 * self.backoff_multiplier.powi(retry_count as i32);
        backoff.min(self.max_backoff_secs as f64) as u64
    }

    /// `true` if a failed attempt number `attempt` (1-based) may be retried.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Resolves a 429's wait: `Ok(secs)` to sleep and retry, `Err(secs)` when
    /// the wait is above the ceiling.
    pub fn rate_limit_wait(&self, retry_after: Option<u64>) -> Result<u64, u64> {
        let wait = retry_after.unwrap_or(self.default_retry_after_secs);
        if wait > self.rate_limit_ceiling_secs {
            Err(wait)
        } else {
            Ok(wait)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetrySettings::default())
    }
}

/// Blocking wait used for backoff, rate limiting and pacing.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Records requested sleeps instead of blocking.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
