//! Bounded retry and polling.
//!
//! Both helpers honour the operation context: a cancelled token aborts the
//! in-flight sleep immediately, and every wait is capped by the caller's
//! deadline as well as the configured timeout.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RetrySettings;
use crate::context::OperationContext;
use crate::error::ProviderError;

/// Outcome of one poll in [`wait_until`].
#[derive(Debug)]
pub enum WaitStatus<T> {
    Done(T),
    /// Not there yet; the string is the current state, for logging.
    Pending(String),
}

async fn sleep_or_cancel(
    ctx: &OperationContext,
    delay: Duration,
    what: &str,
) -> Result<(), ProviderError> {
    tokio::select! {
        _ = ctx.cancel.cancelled() => Err(ProviderError::Cancelled(what.to_string())),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Run `op`, retrying retryable errors with exponential backoff until it
/// succeeds, fails terminally, runs out of attempts, or `window` elapses.
pub async fn with_retry<T, F, Fut>(
    ctx: &OperationContext,
    settings: &RetrySettings,
    window: Duration,
    what: &str,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let started = Instant::now();
    let window = ctx.budget(window);
    let mut attempt = 0u32;

    loop {
        if ctx.is_cancelled() {
            return Err(ProviderError::Cancelled(what.to_string()));
        }
        attempt += 1;

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                let delay = settings.delay_for(attempt);
                if attempt >= settings.max_attempts || started.elapsed() + delay > window {
                    tracing::warn!(what, attempt, error = %e, "giving up after retries");
                    return Err(e);
                }
                tracing::debug!(
                    what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying"
                );
                sleep_or_cancel(ctx, delay, what).await?;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Poll `fetch` every `interval` until it reports [`WaitStatus::Done`].
///
/// Retryable errors from `fetch` count as "still pending". Fails with
/// [`ProviderError::Timeout`] once `timeout` (or the context deadline) has
/// passed; never retries past it.
pub async fn wait_until<T, F, Fut>(
    ctx: &OperationContext,
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut fetch: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<WaitStatus<T>, ProviderError>>,
{
    let budget = ctx.budget(timeout);
    let deadline = Instant::now() + budget;

    loop {
        if ctx.is_cancelled() {
            return Err(ProviderError::Cancelled(what.to_string()));
        }

        match fetch().await {
            Ok(WaitStatus::Done(value)) => return Ok(value),
            Ok(WaitStatus::Pending(state)) => {
                tracing::debug!(what, state = %state, "waiting");
            }
            Err(e) if e.is_retryable() => {
                tracing::debug!(what, error = %e, "retryable error while waiting");
            }
            Err(e) => return Err(e),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ProviderError::Timeout {
                what: what.to_string(),
                seconds: budget.as_secs(),
            });
        }
        sleep_or_cancel(ctx, interval.min(deadline - now), what).await?;
    }
}
