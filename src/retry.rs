//! Bounded retry with credential rotation
//!
//! Retryable failures (rate limits) rotate the [`CredentialPool`], wait a
//! fixed backoff and try again with the next credential. Non-retryable
//! failures end the loop immediately. The loop reports one of three outcomes
//! so callers never have to infer "retries ran out" from an absent value.
//!
//! # Example
//!
//! ```no_run
//! use sheet_classifier::config::RetryConfig;
//! use sheet_classifier::pool::CredentialPool;
//! use sheet_classifier::retry::{retry_with_rotation, IsRetryable, RetryOutcome};
//!
//! #[derive(Debug)]
//! struct Throttled;
//!
//! impl std::fmt::Display for Throttled {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "throttled")
//!     }
//! }
//!
//! impl IsRetryable for Throttled {
//!     fn is_retryable(&self) -> bool {
//!         true
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pool = CredentialPool::new(["key-a", "key-b"])?;
//! let config = RetryConfig::default();
//! let outcome = retry_with_rotation(&config, &mut pool, |_, _| {}, |key| async move {
//!     if key.expose() == "key-b" { Ok("done") } else { Err(Throttled) }
//! })
//! .await;
//! assert!(matches!(outcome, RetryOutcome::Succeeded("done")));
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::ClientError;
use crate::pool::{Credential, CredentialPool};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Only failures that another credential could plausibly avoid (quota,
/// throttling) should return `true`.
pub trait IsRetryable {
    /// Returns true if the operation should be retried with the next credential
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ClientError {
    fn is_retryable(&self) -> bool {
        self.is_rate_limited()
    }
}

/// Result of a bounded retry loop
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// The operation succeeded on some attempt
    Succeeded(T),
    /// The operation failed with a non-retryable error
    Failed(E),
    /// Every attempt failed with a retryable error
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// The error from the final attempt
        last_error: E,
    },
}

/// Run `operation` with the pool's current credential, rotating on retryable errors
///
/// # Arguments
///
/// * `config` - Attempt budget and backoff (`max_attempts` of 0 is treated as 1)
/// * `pool` - Credential pool; its cursor advances once per retryable failure
/// * `on_rotate` - Called after each rotation with the pool (already pointing at
///   the new credential) and the attempt number that failed
/// * `operation` - Async closure receiving the credential to use for this attempt
pub async fn retry_with_rotation<F, Fut, T, E, R>(
    config: &RetryConfig,
    pool: &mut CredentialPool,
    mut on_rotate: R,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(Credential) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    R: FnMut(&CredentialPool, u32),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let credential = pool.current().clone();

        match operation(credential).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "request succeeded after retry");
                }
                return RetryOutcome::Succeeded(result);
            }
            Err(e) if e.is_retryable() => {
                pool.rotate();
                on_rotate(&*pool, attempt);

                let delay = if config.jitter {
                    add_jitter(config.backoff)
                } else {
                    config.backoff
                };

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis(),
                    "rate limited, switched key (attempt {}/{})",
                    attempt,
                    max_attempts
                );

                tokio::time::sleep(delay).await;

                if attempt >= max_attempts {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "request failed after all attempts exhausted"
                    );
                    return RetryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: e,
                    };
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "request failed with non-retryable error");
                return RetryOutcome::Failed(e);
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
