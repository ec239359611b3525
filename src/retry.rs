//! Bounded retry with a fixed delay.
//!
//! Attempts run strictly one after another. The delay is constant (no jitter,
//! no backoff) and is skipped after the final attempt.

use crate::model::RetryPolicy;
use std::fmt::Display;
use std::future::Future;

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// The last failure is returned unchanged. A policy with zero attempts is
/// treated as one attempt.
pub async fn with_retry<T, E, F, Fut>(label: &str, policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        tracing::info!("Attempting {label} - Attempt {attempt}/{max}");
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::error!("Error in {label} - Attempt {attempt}/{max}: {e}");
                if attempt >= max {
                    return Err(e);
                }
                tracing::info!(
                    "Retrying {label} in {}",
                    humantime::format_duration(policy.delay)
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
