//! Bounded exponential backoff around fallible network calls

use crate::config::RetryPolicy;
use crate::error::Result;
use crate::execution::Shutdown;
use std::future::Future;
use tracing::{error, warn};

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempt ceiling is reached.
///
/// `op` receives the 1-based attempt number. Backoff sleeps are cancelled by
/// `shutdown`; an attempt already in flight is always awaited to completion.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    shutdown: &Shutdown,
    operation: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "⚠️ {} failed (attempt {}/{}): {} - retrying in {:?}",
                    operation, attempt, attempts, e, delay
                );
                shutdown.sleep(delay).await?;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    error!("❌ {} failed after {} attempts: {}", operation, attempt, e);
                }
                return Err(e);
            }
        }
    }
}
