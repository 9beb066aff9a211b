use crate::error::RetryAfter;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Total number of attempts, the first one included.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_factor: f64,
    pub logging: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            backoff_factor: 2.0,
            logging: true,
        }
    }
}

impl RetryOptions {
    pub fn quiet(mut self) -> Self {
        self.logging = false;
        self
    }
}

/// Run `operation` until it succeeds or `max_retries` attempts have failed.
///
/// The delay before each retry is the error's own `retry_after` when it has
/// one, otherwise the current exponential backoff. Both are capped at
/// `max_backoff_ms`. The error from the last attempt is returned unchanged.
pub async fn execute<T, E, F, Fut>(mut operation: F, opts: &RetryOptions) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryAfter + std::fmt::Display,
{
    let max_attempts = opts.max_retries.max(1);
    let max_backoff = Duration::from_millis(opts.max_backoff_ms);
    let mut backoff_ms = opts.initial_backoff_ms.min(opts.max_backoff_ms);
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    if opts.logging {
                        log::warn!("Giving up after {} attempts: {}", attempt, e);
                    }
                    return Err(e);
                }

                let delay = e
                    .retry_after()
                    .unwrap_or(Duration::from_millis(backoff_ms))
                    .min(max_backoff);
                if opts.logging {
                    log::warn!(
                        "Attempt {}/{} failed: {}. Retrying in {}ms...",
                        attempt,
                        max_attempts,
                        e,
                        delay.as_millis()
                    );
                }
                tokio::time::sleep(delay).await;

                backoff_ms = next_backoff_ms(backoff_ms, opts.backoff_factor, opts.max_backoff_ms);
            }
        }
    }
}

/// Grow `current_ms` by `factor` (never shrinking), clamped to `max_ms`.
/// The product is taken in floating point so huge or infinite factors
/// saturate at the ceiling.
fn next_backoff_ms(current_ms: u64, factor: f64, max_ms: u64) -> u64 {
    let grown = current_ms as f64 * factor.max(1.0);
    if grown.is_nan() {
        return max_ms;
    }
    grown.min(max_ms as f64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn fast() -> RetryOptions {
        RetryOptions {
            max_retries: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            backoff_factor: 2.0,
            logging: false,
        }
    }

    #[tokio::test]
    async fn gives_up_after_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let res: Result<(), ApiError> = execute(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(ApiError::new(500, format!("failure {}", n))) }
            },
            &fast(),
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // original error from the final attempt
        assert_eq!(res.unwrap_err().message, "failure 3");
    }

    #[tokio::test]
    async fn first_success_is_returned_without_retry() {
        let calls = AtomicU32::new(0);
        let res: Result<u32, ApiError> = execute(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            },
            &fast(),
        )
        .await;
        assert_eq!(res.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let res: anyhow::Result<&str> = execute(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(anyhow::anyhow!("flaky"))
                    } else {
                        Ok("done")
                    }
                }
            },
            &fast(),
        )
        .await;
        assert_eq!(res.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_after_is_capped_by_max_backoff() {
        let opts = RetryOptions { max_retries: 2, initial_backoff_ms: 1, max_backoff_ms: 20, backoff_factor: 2.0, logging: false };
        let start = Instant::now();
        let res: Result<(), ApiError> = execute(
            || async {
                Err(ApiError::new(429, "slow down").with_retry_after(Some(Duration::from_secs(120))))
            },
            &opts,
        )
        .await;
        assert!(res.is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn short_retry_after_replaces_long_backoff() {
        let calls = AtomicU32::new(0);
        let opts = RetryOptions { max_retries: 2, initial_backoff_ms: 3000, max_backoff_ms: 60_000, backoff_factor: 2.0, logging: false };
        let start = Instant::now();
        let res: Result<(), ApiError> = execute(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::new(429, "slow down").with_retry_after(Some(Duration::from_millis(10)))) }
            },
            &opts,
        )
        .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn backoff_doubles_up_to_the_ceiling() {
        let opts = RetryOptions::default();
        let mut backoff = opts.initial_backoff_ms;
        let mut schedule = vec![backoff];
        for _ in 0..7 {
            backoff = next_backoff_ms(backoff, opts.backoff_factor, opts.max_backoff_ms);
            schedule.push(backoff);
        }
        assert_eq!(schedule, vec![1000, 2000, 4000, 8000, 16_000, 32_000, 60_000, 60_000]);
    }

    #[test]
    fn degenerate_factors_saturate_or_hold() {
        assert_eq!(next_backoff_ms(1, 1e30, 5), 5);
        assert_eq!(next_backoff_ms(1, f64::INFINITY, 5), 5);
        assert_eq!(next_backoff_ms(0, f64::INFINITY, 5), 5);
        assert_eq!(next_backoff_ms(3, 0.5, 5), 3);
        assert_eq!(next_backoff_ms(3, f64::NAN, 5), 3);
    }

    #[tokio::test]
    async fn huge_backoff_factor_still_gives_up_cleanly() {
        let calls = AtomicU32::new(0);
        let opts = RetryOptions { backoff_factor: 1e30, ..fast() };
        let res: Result<(), ApiError> = execute(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::new(500, "down")) }
            },
            &opts,
        )
        .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_max_retries_still_runs_once() {
        let calls = AtomicU32::new(0);
        let opts = RetryOptions { max_retries: 0, ..fast() };
        let _: Result<(), ApiError> = execute(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::new(500, "nope")) }
            },
            &opts,
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
