//! Async retry utilities with exponential backoff

use std::time::Duration;

/// Retry an async operation with exponential backoff.
///
/// Delay before attempt `n + 1` is `base_delay_ms * 2^(n - 1)`.
/// Returns `Ok((value, attempts))` on success, or `Err((error, attempts))` once
/// `max_attempts` is exhausted. A `max_attempts` of 0 is treated as 1.
pub async fn retry_with_backoff_async<F, Fut, T, E>(
    max_attempts: u32,
    base_delay_ms: u64,
    mut operation: F,
) -> Result<(T, u32), (E, u32)>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok((value, attempts)),
            Err(e) => {
                if attempts >= max_attempts {
                    return Err((e, attempts));
                }
                let delay = backoff_delay(base_delay_ms, attempts);
                tracing::warn!(
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Backoff delay after the given (1-based) failed attempt
fn backoff_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_delay_ms.saturating_mul(factor))
}
