//! Retry with exponential backoff for provider calls.
//!
//! Retried:
//! - Timeouts
//! - Connection failures
//!
//! Not retried (aborts on first occurrence):
//! - Authentication failures, not-found, rate limiting
//! - Any other provider error
//!
//! Backoff sleeps and in-flight calls both observe a cancellation token.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use skycast_core::{ProviderError, RetrySettings, WeatherError};

/// Default retry configuration
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY_SECS: f64 = 1.0;
pub const DEFAULT_MAX_DELAY_SECS: f64 = 60.0;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier applied per retry
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs_f64(DEFAULT_BASE_DELAY_SECS),
            max_delay: Duration::from_secs_f64(DEFAULT_MAX_DELAY_SECS),
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        let defaults = Self::default();
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::try_from_secs_f64(settings.base_delay_secs)
                .unwrap_or(defaults.base_delay),
            max_delay: Duration::try_from_secs_f64(settings.max_delay_secs)
                .unwrap_or(defaults.max_delay),
            backoff_factor: settings.backoff_factor,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            backoff_factor,
        }
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry `attempt` (0-based):
    /// `min(base_delay * backoff_factor^attempt, max_delay)`. No jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Should retry the request
    Retry,
    /// Should not retry - permanent failure
    NoRetry,
}

/// Check if a provider error is retryable
pub fn classify(error: &ProviderError) -> RetryDecision {
    if error.is_retryable() {
        RetryDecision::Retry
    } else {
        RetryDecision::NoRetry
    }
}

/// One failed attempt that will be followed by another.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// 1-based attempt number that failed
    pub number: u32,
    pub error: ProviderError,
    /// Wait before the next attempt
    pub delay: Duration,
}

/// Why a retried operation gave up.
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: ProviderError,
    },

    #[error("non-retryable error on attempt {attempt}: {error}")]
    Fatal { attempt: u32, error: ProviderError },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl RetryError {
    /// Attempts started before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Fatal { attempt, .. } => *attempt,
            Self::Cancelled { attempts } => *attempts,
        }
    }
}

impl From<RetryError> for WeatherError {
    fn from(e: RetryError) -> Self {
        match e {
            RetryError::Exhausted {
                attempts,
                last_error,
            } => WeatherError::ProviderTransient {
                attempts,
                source: last_error,
            },
            RetryError::Fatal { error, .. } => WeatherError::ProviderFatal(error),
            RetryError::Cancelled { .. } => WeatherError::Cancelled,
        }
    }
}

/// Runs provider calls under a [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    cancel: CancellationToken,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation` until it succeeds, fails fatally, runs out of
    /// attempts, or the executor's token is cancelled.
    ///
    /// # Example
    /// ```ignore
    /// let observation = executor
    ///     .run("current weather", || provider.current_weather(&query, units))
    ///     .await?;
    /// ```
    pub async fn run<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.config.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!("{} cancelled during attempt {}", operation_name, attempt);
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
                result = operation() => result,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!("{} succeeded after {} attempts", operation_name, attempt);
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if classify(&error) == RetryDecision::NoRetry {
                tracing::debug!("{}: non-retryable error: {}", operation_name, error);
                return Err(RetryError::Fatal { attempt, error });
            }

            if attempt >= max_attempts {
                tracing::error!(
                    "{}: all {} attempts exhausted, last error: {}",
                    operation_name,
                    max_attempts,
                    error
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let next = RetryAttempt {
                number: attempt,
                delay: self.config.delay_for_attempt(attempt - 1),
                error,
            };
            tracing::warn!(
                "{}: retryable error on attempt {} of {}: {} (retrying in {:?})",
                operation_name,
                next.number,
                max_attempts,
                next.error,
                next.delay
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!("{} cancelled during backoff", operation_name);
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
                _ = tokio::time::sleep(next.delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn executor(max_retries: u32) -> RetryExecutor {
        RetryExecutor::new(
            RetryConfig::new(max_retries, Duration::from_secs(1), Duration::from_secs(60), 2.0),
            CancellationToken::new(),
        )
    }

    fn timeout() -> ProviderError {
        ProviderError::Timeout("deadline elapsed".into())
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(60));
        assert_eq!(config.backoff_factor, 2.0);
        assert_eq!(config.max_attempts(), 4);
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(6), Duration::from_secs(60));
        assert_eq!(config.delay_for_attempt(1_000), Duration::from_secs(60));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_delay_matches_formula_across_parameters() {
        for base in [0.0, 0.1, 0.5, 1.0, 3.0] {
            for factor in [1.0, 1.5, 2.0, 3.0] {
                for max in [0.5, 5.0, 60.0] {
                    let config = RetryConfig::new(
                        3,
                        Duration::from_secs_f64(base),
                        Duration::from_secs_f64(max),
                        factor,
                    );
                    for attempt in 0..12u32 {
                        let expected = (base * factor.powi(attempt as i32)).min(max);
                        let actual = config.delay_for_attempt(attempt).as_secs_f64();
                        assert!(
                            (expected - actual).abs() < 1e-6,
                            "base={} factor={} max={} attempt={}: {} != {}",
                            base, factor, max, attempt, expected, actual
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_from_settings() {
        let settings = RetrySettings {
            max_retries: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 10.0,
            backoff_factor: 3.0,
        };
        let config = RetryConfig::from(&settings);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert_eq!(config.backoff_factor, 3.0);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&timeout()), RetryDecision::Retry);
        assert_eq!(classify(&ProviderError::Connection("refused".into())), RetryDecision::Retry);
        assert_eq!(classify(&ProviderError::Unauthorized), RetryDecision::NoRetry);
        assert_eq!(classify(&ProviderError::RateLimited), RetryDecision::NoRetry);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_transient_failure_uses_every_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = executor(3)
            .run("test", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(timeout()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(RetryError::Exhausted { attempts, last_error }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last_error, timeout());
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_after_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = executor(3)
            .run("test", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::Unauthorized) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(RetryError::Fatal { attempt: 1, error: ProviderError::Unauthorized })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_third_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = Instant::now();

        let result = executor(3)
            .run("test", || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(timeout())
                    } else {
                        Ok("sunny")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "sunny");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Backoff of 1s then 2s
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_means_single_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = executor(0)
            .run("test", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(timeout()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let token = CancellationToken::new();
        let executor = RetryExecutor::new(RetryConfig::default(), token.clone());
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), _> = executor
            .run("test", || {
                counter.fetch_add(1, Ordering::SeqCst);
                token.cancel();
                async { Err(timeout()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1 })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_call() {
        let token = CancellationToken::new();
        let executor = RetryExecutor::new(RetryConfig::default(), token.clone());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let result: Result<(), _> = executor
            .run("test", || async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1 })));
    }

    #[test]
    fn test_retry_error_maps_to_taxonomy() {
        let exhausted: WeatherError = RetryError::Exhausted {
            attempts: 4,
            last_error: timeout(),
        }
        .into();
        assert!(matches!(exhausted, WeatherError::ProviderTransient { attempts: 4, .. }));

        let fatal: WeatherError = RetryError::Fatal {
            attempt: 1,
            error: ProviderError::RateLimited,
        }
        .into();
        assert!(matches!(fatal, WeatherError::ProviderFatal(ProviderError::RateLimited)));

        let cancelled: WeatherError = RetryError::Cancelled { attempts: 2 }.into();
        assert!(matches!(cancelled, WeatherError::Cancelled));
    }
}
