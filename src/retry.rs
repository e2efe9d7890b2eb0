// SPDX-License-Identifier: MIT
//! Linear-backoff retry for the download flow.
//!
//! Provides [`retry_with_backoff`], a generic async helper that retries a
//! fallible operation with linearly increasing delays between attempts. The
//! closure receives the 1-based attempt number so callers can log progress.
//!
//! # Example
//! ```rust,ignore
//! use indeed_csv_downloader::retry::{retry_with_backoff, RetryConfig};
//!
//! let result = retry_with_backoff(&RetryConfig::default(), |attempt| async move {
//!     run_download_flow(attempt).await
//! })
//! .await;
//! ```

use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for [`retry_with_backoff`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first try).
    ///
    /// Default: 3
    pub max_attempts: u32,
    /// Base delay unit. The wait after attempt `n` is `base_delay * n`.
    ///
    /// Default: 5 s
    pub base_delay: Duration,
    /// Upper bound on the delay between attempts.
    ///
    /// Default: 60 s
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Create a config suitable for quick unit tests (no real waiting).
    pub fn instant() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        }
    }

    /// Create a config with a single attempt (no retries).
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Plain linear schedule: the wait after attempt `n` is exactly
    /// `base_delay * n`, with no ceiling.
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: Duration::MAX,
        }
    }

    /// Delay to wait after the given 1-based attempt fails.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.saturating_mul(attempt);
        scaled.min(self.max_delay)
    }
}

/// Retry an async operation with linear backoff.
///
/// Calls `f(attempt)` up to `config.max_attempts` times, passing the 1-based
/// attempt number. On each failure, waits `base_delay * attempt` (capped at
/// `max_delay`) before trying again.
///
/// Returns `Ok(result)` on the first success, or `Err(last_error)` after all
/// attempts have been exhausted.
///
/// # Panics
/// Panics if `config.max_attempts` is 0 (would never attempt the operation).
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
{
    assert!(
        config.max_attempts > 0,
        "RetryConfig.max_attempts must be at least 1"
    );

    let mut last_err: Option<E> = None;

    for attempt in 1..=config.max_attempts {
        match f(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "retry succeeded");
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt < config.max_attempts {
                    let delay = config.delay_after(attempt);
                    warn!(
                        attempt,
                        max = config.max_attempts,
                        delay_ms = delay.as_millis(),
                        err = ?e,
                        "attempt failed — retrying"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    warn!(
                        attempt,
                        max = config.max_attempts,
                        err = ?e,
                        "all retry attempts exhausted"
                    );
                    last_err = Some(e);
                }
            }
        }
    }

    // Safety: the loop always assigns last_err when all attempts fail.
    Err(last_err.expect("retry loop ended without setting last_err"))
}
