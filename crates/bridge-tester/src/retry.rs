//! Exponential backoff for transient endpoint failures.

use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

use crate::chain::ChainKind;

/// Backoff schedule for read calls against a chain endpoint.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: usize,
}

impl RetryPolicy {
    /// Fail on the first error.
    pub const fn none() -> Self {
        Self { initial_delay: Duration::ZERO, max_delay: Duration::ZERO, max_retries: 0 }
    }

    fn delay(&self, attempt: usize) -> Duration {
        let base = self.initial_delay.saturating_mul(1 << attempt.min(10));
        let capped = base.min(self.max_delay);
        let jitter_ms = capped.as_millis() as u64 / 4;
        let jitter = if jitter_ms == 0 { 0 } else { rand::thread_rng().gen_range(0..=jitter_ms) };
        capped + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            max_retries: 5,
        }
    }
}

/// Whether an endpoint error is worth retrying.
pub fn is_transient_error(err: &eyre::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    [
        "connection",
        "timeout",
        "timed out",
        "rate limit",
        "too many requests",
        "429",
        "502",
        "503",
        "504",
        "temporarily unavailable",
        "network",
        "reset by peer",
        "broken pipe",
        "eof",
    ]
    .iter()
    .any(|needle| msg.contains(needle))
}

pub async fn with_retry<F, Fut, T>(
    policy: RetryPolicy,
    chain: ChainKind,
    operation: &str,
    mut f: F,
) -> eyre::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = eyre::Result<T>>,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !is_transient_error(&err) {
                    debug!(%chain, %operation, error = %err, "Non-transient error, not retrying");
                    return Err(err);
                }

                if attempt >= policy.max_retries {
                    warn!(%chain, %operation, attempts = attempt, error = %err, "Max retries exceeded");
                    return Err(err);
                }

                let delay = policy.delay(attempt);
                warn!(
                    %chain,
                    %operation,
                    attempt = attempt + 1,
                    max_attempts = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient endpoint error, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
