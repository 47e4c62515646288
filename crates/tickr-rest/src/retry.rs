//! Bounded retry with exponential backoff and jitter
//!
//! A server-supplied `Retry-After` hint on a rate-limit error always wins over
//! the computed backoff. The operation is never run concurrently with itself:
//! attempts are strictly sequential, separated by a single sleep.

use std::future::Future;
use std::time::Duration;

use tickr_types::{SdkError, SdkResult};
use tracing::{debug, warn};

/// Slack added on top of a server retry hint so the retry lands after the window resets
pub const RETRY_AFTER_BUFFER: Duration = Duration::from_millis(100);

/// Resolved retry settings for one retry loop
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOptions {
    /// Retries after the initial attempt (total attempts = `max_retries + 1`)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub backoff_multiplier: f64,
    /// Multiply each computed delay by a random factor in `[0.5, 1.5)`
    pub jitter: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Caller-supplied partial retry settings
///
/// Unset fields fall through to whatever they are merged over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryOverrides {
    pub max_retries: Option<u32>,
    pub initial_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub backoff_multiplier: Option<f64>,
    pub jitter: Option<bool>,
}

impl RetryOverrides {
    /// Right-biased merge: fields set here replace those of `base`
    pub fn merged_over(&self, base: &RetryOptions) -> RetryOptions {
        RetryOptions {
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            initial_delay: self.initial_delay.unwrap_or(base.initial_delay),
            max_delay: self.max_delay.unwrap_or(base.max_delay),
            backoff_multiplier: self.backoff_multiplier.unwrap_or(base.backoff_multiplier),
            jitter: self.jitter.unwrap_or(base.jitter),
        }
    }

    /// True if no field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }
}

impl From<RetryOptions> for RetryOverrides {
    fn from(options: RetryOptions) -> Self {
        Self {
            max_retries: Some(options.max_retries),
            initial_delay: Some(options.initial_delay),
            max_delay: Some(options.max_delay),
            backoff_multiplier: Some(options.backoff_multiplier),
            jitter: Some(options.jitter),
        }
    }
}

/// Merge caller overrides over the defaults
pub fn resolve_retry_options(overrides: &RetryOverrides) -> RetryOptions {
    overrides.merged_over(&RetryOptions::default())
}

/// Delay to wait before the next attempt
///
/// `attempt` is 0-indexed: the wait after the first failure uses `attempt = 0`.
/// A rate-limit error carrying a retry hint yields `hint + 100ms`, capped at
/// `max_delay`, regardless of `attempt`.
pub fn calculate_delay(
    attempt: u32,
    options: &RetryOptions,
    last_error: Option<&SdkError>,
) -> Duration {
    if let Some(hint) = last_error
        .filter(|e| e.is_rate_limit())
        .and_then(|e| e.retry_after())
    {
        return hint.saturating_add(RETRY_AFTER_BUFFER).min(options.max_delay);
    }

    let exponent = attempt.min(i32::MAX as u32) as i32;
    let mut delay_ms =
        options.initial_delay.as_millis() as f64 * options.backoff_multiplier.powi(exponent);
    if options.jitter {
        delay_ms *= 0.5 + rand::random::<f64>();
    }

    let max_ms = options.max_delay.as_millis() as f64;
    Duration::from_millis(delay_ms.clamp(0.0, max_ms) as u64)
}

/// Passed to the retry hook before each wait
#[derive(Debug, Clone, Copy)]
pub struct RetryContext<'a> {
    /// Retry number about to be performed (1 for the first retry)
    pub attempt: u32,
    /// Configured retry bound
    pub max_retries: u32,
    /// Failure that triggered the retry
    pub error: &'a SdkError,
}

/// Hook invoked synchronously before each retry wait
pub type RetryHook = dyn Fn(&RetryContext<'_>) + Send + Sync;

/// Run `operation` until it succeeds, fails terminally, or retries run out
///
/// Non-retryable errors propagate on first occurrence without waiting. On
/// exhaustion the last error is returned unchanged.
pub async fn with_retry<T, F, Fut>(
    mut operation: F,
    options: &RetryOptions,
    on_retry: Option<&(dyn Fn(&RetryContext<'_>) + Send + Sync)>,
) -> SdkResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SdkResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !error.is_retryable() {
            debug!(code = %error.code(), "Non-retryable error, giving up");
            return Err(error);
        }
        if attempt >= options.max_retries {
            debug!(attempts = attempt + 1, "Retries exhausted");
            return Err(error);
        }

        if let Some(hook) = on_retry {
            hook(&RetryContext {
                attempt: attempt + 1,
                max_retries: options.max_retries,
                error: &error,
            });
        }

        let delay = calculate_delay(attempt, options, Some(&error));
        warn!(
            attempt = attempt + 1,
            max_retries = options.max_retries,
            code = %error.code(),
            delay_ms = delay.as_millis() as u64,
            "Request failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tickr_types::ErrorCode;
    use tokio::time::Instant;

    fn no_jitter() -> RetryOptions {
        RetryOptions::default().with_jitter(false)
    }

    #[test]
    fn test_default_options() {
        let opts = RetryOptions::default();
        assert_eq!(opts.max_retries, 3);
        assert_eq!(opts.initial_delay, Duration::from_millis(1000));
        assert_eq!(opts.max_delay, Duration::from_millis(30_000));
        assert_eq!(opts.backoff_multiplier, 2.0);
        assert!(opts.jitter);
    }

    #[test]
    fn test_resolve_is_right_biased() {
        let resolved = resolve_retry_options(&RetryOverrides::default().max_retries(7).jitter(false));
        assert_eq!(resolved.max_retries, 7);
        assert!(!resolved.jitter);
        assert_eq!(resolved.initial_delay, Duration::from_millis(1000));

        let base = RetryOptions::default().with_max_retries(1);
        let merged = RetryOverrides::default()
            .initial_delay(Duration::from_millis(5))
            .merged_over(&base);
        assert_eq!(merged.max_retries, 1);
        assert_eq!(merged.initial_delay, Duration::from_millis(5));
    }

    #[test]
    fn test_exponential_delay_without_jitter() {
        let opts = no_jitter();
        for attempt in 0..12u32 {
            let expected = (1000u64 * 2u64.pow(attempt)).min(30_000);
            assert_eq!(
                calculate_delay(attempt, &opts, None),
                Duration::from_millis(expected),
                "attempt {}",
                attempt
            );
        }
        // Very large attempts saturate at the cap
        assert_eq!(calculate_delay(5000, &opts, None), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let opts = RetryOptions::default();
        for _ in 0..200 {
            let d = calculate_delay(1, &opts, None).as_millis();
            // base 2000ms, factor in [0.5, 1.5)
            assert!((1000..3000).contains(&d), "delay {} out of range", d);
        }
        for _ in 0..200 {
            assert!(calculate_delay(10, &opts, None) <= opts.max_delay);
        }
    }

    #[test]
    fn test_retry_after_hint_takes_priority() {
        let err = SdkError::rate_limited("slow down", 20, None);
        for attempt in [0, 1, 4, 9] {
            assert_eq!(
                calculate_delay(attempt, &RetryOptions::default(), Some(&err)),
                Duration::from_millis(20_100)
            );
        }

        // Still capped at max_delay
        let long = SdkError::rate_limited("slow down", 120, None);
        assert_eq!(
            calculate_delay(0, &RetryOptions::default(), Some(&long)),
            Duration::from_millis(30_000)
        );

        let huge = SdkError::rate_limited("slow down", u64::MAX, None);
        assert_eq!(
            calculate_delay(0, &RetryOptions::default(), Some(&huge)),
            Duration::from_millis(30_000)
        );

        // A hint on a non rate-limit error is not consulted
        let server = SdkError::server("boom");
        assert_eq!(
            calculate_delay(2, &no_jitter(), Some(&server)),
            Duration::from_millis(4000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failures_run_max_retries_plus_one() {
        let calls = AtomicU32::new(0);
        let result: SdkResult<()> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SdkError::network("reset")) }
            },
            &no_jitter(),
            None,
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Network);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_failure_runs_once() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result: SdkResult<()> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SdkError::auth("bad key")) }
            },
            &RetryOptions::default(),
            None,
        )
        .await;

        assert_eq!(result.unwrap_err().code(), ErrorCode::Auth);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_and_waits_backoff() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result = with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(SdkError::server("unavailable"))
                    } else {
                        Ok(n)
                    }
                }
            },
            &no_jitter(),
            None,
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        // 1000ms + 2000ms
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hook_sees_each_retry() {
        let seen: Arc<Mutex<Vec<(u32, u32, ErrorCode)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let hook = move |ctx: &RetryContext<'_>| {
            sink.lock().push((ctx.attempt, ctx.max_retries, ctx.error.code()));
        };

        let _: SdkResult<()> = with_retry(
            || async { Err(SdkError::timeout(Duration::from_secs(1))) },
            &no_jitter().with_max_retries(2),
            Some(&hook),
        )
        .await;

        assert_eq!(
            *seen.lock(),
            vec![(1, 2, ErrorCode::Timeout), (2, 2, ErrorCode::Timeout)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_wait_uses_hint() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result = with_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(SdkError::rate_limited("throttled", 2, None))
                    } else {
                        Ok(())
                    }
                }
            },
            &RetryOptions::default(),
            None,
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(start.elapsed(), Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_is_single_attempt() {
        let calls = AtomicU32::new(0);
        let _: SdkResult<()> = with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SdkError::network("down")) }
            },
            &RetryOptions::no_retry(),
            None,
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
