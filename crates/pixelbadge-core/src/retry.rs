//! Bounded retry loop shared by every network operation.
//!
//! Each attempt first waits for connectivity, then re-checks that the
//! caller's context is still current, then issues exactly one request.
//! Failed attempts sleep for the policy backoff before the next one.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::connectivity::Gate;
use crate::error::{ApiError, RetryError};

/// Attempt budget and the sleep between failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

/// Runs `attempt` until it succeeds, the budget runs out, or `is_current`
/// reports that the result is no longer wanted.
///
/// `is_current` is checked after every suspension point: after the
/// connectivity wait and again after the response arrives. A stale result
/// is discarded and reported as [`RetryError::Stale`].
///
/// # Errors
/// Returns [`RetryError::Exhausted`] after `policy.max_attempts` failed
/// requests, or [`RetryError::Stale`] as soon as the context changes.
pub async fn with_retries<T, F, Fut, C>(
    label: &str,
    policy: RetryPolicy,
    gate: Gate<'_>,
    is_current: C,
    mut attempt: F,
) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
    C: Fn() -> bool,
{
    for n in 1..=policy.max_attempts {
        if n > 1 {
            debug!(op = label, attempt = n, max = policy.max_attempts, "retrying");
            tokio::time::sleep(policy.backoff).await;
        }

        gate.wait(label).await;
        if !is_current() {
            debug!(op = label, "context changed, abandoning");
            return Err(RetryError::Stale);
        }

        match attempt(n).await {
            Ok(value) => {
                if !is_current() {
                    debug!(op = label, "context changed, dropping result");
                    return Err(RetryError::Stale);
                }
                return Ok(value);
            }
            Err(err) => {
                warn!(op = label, attempt = n, max = policy.max_attempts, error = %err, "attempt failed");
            }
        }
    }

    warn!(op = label, attempts = policy.max_attempts, "retries exhausted");
    Err(RetryError::Exhausted {
        attempts: policy.max_attempts,
    })
}
