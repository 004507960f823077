//! Explicit waits against live browser state.
//!
//! The browser renders and runs scripts asynchronously from the driver's
//! perspective, so every interaction that depends on a DOM mutation is gated
//! by a polled predicate rather than a fixed sleep. `wait_until` is the
//! building block; the bool and fallible flavours specialise it.

use crate::error::{HarnessError, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Default timeout for wait operations (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default poll interval for checking conditions (100ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Timeout and poll interval for a single wait call.
#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    /// Maximum time to wait for the condition.
    pub timeout: Duration,

    /// How often to re-evaluate the condition.
    pub poll_interval: Duration,
}

impl WaitConfig {
    /// Creates a new wait configuration.
    #[must_use]
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Custom timeout, default poll interval.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, DEFAULT_POLL_INTERVAL)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

/// Polls `predicate` until it yields a value or the timeout elapses.
///
/// The predicate is evaluated immediately and then at `poll_interval`, so a
/// condition that is already true returns without waiting. On timeout the
/// call fails with [`HarnessError::WaitTimeout`] carrying `description`.
pub async fn wait_until<T, F, Fut>(predicate: F, config: WaitConfig, description: &str) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();

    loop {
        if let Some(value) = predicate().await {
            return Ok(value);
        }

        if start.elapsed() >= config.timeout {
            return Err(HarnessError::WaitTimeout {
                condition: description.to_string(),
                timeout: config.timeout,
            });
        }

        sleep(config.poll_interval).await;
    }
}

/// Waits for a boolean condition to become true.
pub async fn wait_for<F, Fut>(condition: F, config: WaitConfig, description: &str) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    wait_until(
        || {
            let fut = condition();
            async move { fut.await.then_some(()) }
        },
        config,
        description,
    )
    .await
}

/// Waits for a fallible condition, treating predicate errors as "not yet".
///
/// Script evaluation against a page that is mid-navigation fails
/// transiently; swallowing those errors and polling again is what makes
/// selector waits usable across reloads.
pub async fn wait_for_result<F, Fut>(
    condition: F,
    config: WaitConfig,
    description: &str,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    wait_until(
        || {
            let fut = condition();
            async move {
                match fut.await {
                    Ok(true) => Some(()),
                    Ok(false) | Err(_) => None,
                }
            }
        },
        config,
        description,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_promptly_when_already_true() {
        let start = Instant::now();
        let result = wait_for(|| async { true }, WaitConfig::default(), "immediate").await;

        assert!(result.is_ok());
        // Nowhere near the 10s default timeout.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn polls_until_condition_holds() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = wait_for(
            move || {
                let c = counter_clone.clone();
                async move { c.fetch_add(1, Ordering::SeqCst) >= 3 }
            },
            WaitConfig::new(Duration::from_secs(5), Duration::from_millis(10)),
            "counter >= 3",
        )
        .await;

        assert!(result.is_ok());
        assert!(counter.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn times_out_at_or_after_boundary() {
        let timeout = Duration::from_millis(100);
        let start = Instant::now();
        let result = wait_for(
            || async { false },
            WaitConfig::new(timeout, Duration::from_millis(10)),
            "impossible condition",
        )
        .await;

        assert!(start.elapsed() >= timeout);
        match result {
            Err(HarnessError::WaitTimeout { condition, .. }) => {
                assert_eq!(condition, "impossible condition");
            }
            other => panic!("expected WaitTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wait_until_yields_the_value() {
        let result: Result<u32> = wait_until(
            || async { Some(42) },
            WaitConfig::default(),
            "value available",
        )
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn transient_errors_do_not_abort_the_wait() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = wait_for_result(
            move || {
                let a = attempts_clone.clone();
                async move {
                    match a.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(HarnessError::ScriptFailed("context destroyed".into())),
                        1 => Ok(false),
                        _ => Ok(true),
                    }
                }
            },
            WaitConfig::new(Duration::from_secs(5), Duration::from_millis(10)),
            "eventually true",
        )
        .await;

        assert!(result.is_ok());
        assert!(attempts.load(Ordering::SeqCst) >= 3);
    }
}
