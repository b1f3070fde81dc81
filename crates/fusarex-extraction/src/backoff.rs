//! Retry with bounded exponential backoff.
//!
//! [`Backoff`] wraps any fallible async operation. Language-model calls are
//! the motivating case, but nothing here is specific to them. Delays double
//! from `base_delay` up to `max_delay`. Rate-limit shaped errors get their
//! own log line; they are retried exactly like every other failure.

use std::fmt;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use fusarex_common::config::RetryConfig;

/// Bounds for one retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total invocation budget, including the first attempt. Minimum 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Cap applied to every computed delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay slept after the given failed attempt (1-indexed):
    /// `base_delay * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            base_delay: Duration::from_secs(cfg.base_delay_secs),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
        }
    }
}

/// All attempts spent; carries the final error for diagnostics.
#[derive(Debug, Error)]
#[error("operation failed after {attempts} attempts: {last_error}")]
pub struct ExhaustedRetries<E: fmt::Display + fmt::Debug> {
    pub attempts: u32,
    pub last_error: E,
}

/// Observer invoked after each failed attempt, before the sleep. Receives
/// the attempt number and the error text; must not affect control flow.
pub type OnRetry = Box<dyn Fn(u32, &str) + Send + Sync>;

/// Executor running an arbitrary fallible operation under a [`RetryPolicy`].
pub struct Backoff {
    policy: RetryPolicy,
    on_retry: Option<OnRetry>,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            on_retry: None,
        }
    }

    /// Install a retry observer (logging or telemetry hooks).
    pub fn with_on_retry(mut self, observer: impl Fn(u32, &str) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Box::new(observer));
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    ///
    /// The operation is a factory: it is called once per attempt and must
    /// produce a fresh future each time.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, ExhaustedRetries<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + fmt::Debug,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(attempt, "Operation recovered after retries");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if attempt >= max_attempts {
                        return Err(ExhaustedRetries {
                            attempts: attempt,
                            last_error: e,
                        });
                    }
                    let delay = self.policy.delay_for(attempt);
                    let message = e.to_string();
                    if is_rate_limit_signature(&message) {
                        warn!(
                            attempt,
                            max_attempts,
                            delay_secs = delay.as_secs_f64(),
                            "Rate limited, backing off"
                        );
                    } else {
                        warn!(
                            attempt,
                            max_attempts,
                            delay_secs = delay.as_secs_f64(),
                            error = %message,
                            "Attempt failed, retrying"
                        );
                    }
                    if let Some(observer) = &self.on_retry {
                        observer(attempt, &message);
                    }
                    sleep(delay).await;
                }
            }
        }
    }
}

/// True if the error text looks like a provider rate limit ("429",
/// "rate limit", "quota", case-insensitive). Used only to pick the log
/// line; retry behavior is identical either way.
pub fn is_rate_limit_signature(message: &str) -> bool {
    static RATE_LIMIT_RE: OnceLock<Regex> = OnceLock::new();
    let re = RATE_LIMIT_RE.get_or_init(|| Regex::new(r"(?i)429|rate[\s_-]?limit|quota").unwrap());
    re.is_match(message)
}
