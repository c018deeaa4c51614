//! Fixed-delay retries with a per-attempt timeout.

use std::future::Future;
use std::time::Duration;

use relayctl_core::{
    DEFAULT_QUERY_ATTEMPTS, DEFAULT_QUERY_RETRY_DELAY_MS, DEFAULT_QUERY_TIMEOUT_SECS,
    ERROR_TRANSIENT,
};
use tracing::{debug, warn};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_QUERY_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_QUERY_RETRY_DELAY_MS),
            timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }
}

/// Run `op` until it succeeds or `policy.attempts` is exhausted.
///
/// Each attempt is bounded by `policy.timeout`; attempts are separated by
/// `policy.delay`. The last error is reported as [`EngineError::Transient`].
pub async fn with_retries<T, F, Fut>(
    what: &'static str,
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let attempts = policy.attempts.max(1);
    let mut last = String::new();

    for attempt in 1..=attempts {
        let outcome = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(res) => res,
            Err(_) => Err(EngineError::Timeout(policy.timeout)),
        };
        match outcome {
            Ok(v) => {
                debug!(what, attempt, "succeeded");
                return Ok(v);
            }
            Err(e) => {
                warn!(
                    what,
                    attempt,
                    attempts,
                    error = %e,
                    kind = ERROR_TRANSIENT,
                    "attempt failed"
                );
                last = e.to_string();
            }
        }
        if attempt < attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    Err(EngineError::Transient {
        what,
        attempts,
        last,
    })
}
