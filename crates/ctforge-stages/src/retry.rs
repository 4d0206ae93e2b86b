//! Retry Helper
//!
//! A small hand-rolled exponential backoff loop, matching the teacher's own
//! `ERROR_BACKOFF_MS` retry style in the task queue listener rather than
//! pulling in `tokio-retry` for this one spot.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry `op` up to `attempts` times total, sleeping `base * 2^n` between
/// attempts (n starting at 0 for the gap after the first failure). Returns
/// the last error if every attempt fails.
pub async fn retry_with_backoff<T, E, F, Fut>(
    attempts: u32,
    base: Duration,
    label: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last_err = None;
    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(
                    label,
                    attempt = attempt + 1,
                    attempts,
                    error = %err,
                    "attempt failed"
                );
                last_err = Some(err);
                if attempt + 1 < attempts {
                    tokio::time::sleep(base * 2u32.pow(attempt)).await;
                }
            }
        }
    }
    Err(last_err.expect("attempts must be >= 1"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &'static str> = retry_with_backoff(
            3,
            Duration::from_millis(1),
            "test",
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(42)
                }
            },
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_budget_and_returns_last_error() {
        let result: Result<u32, &'static str> =
            retry_with_backoff(2, Duration::from_millis(1), "test", || async { Err("down") })
                .await;
        assert_eq!(result, Err("down"));
    }
}
