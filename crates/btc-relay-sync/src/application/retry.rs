//! # Bounded Retry
//!
//! Doubling backoff, capped per delay and by attempt count. Only errors for
//! which [`RelayError::is_retryable`] holds are retried.

use std::future::Future;

use crate::config::RetryPolicy;
use crate::domain::RelayError;

/// Run `op` until it succeeds, fails fatally or the policy is exhausted.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, RelayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RelayError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "[btc-relay] {} failed (attempt {}/{}): {}; retrying in {:?}",
                    operation,
                    attempt,
                    max_attempts,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
