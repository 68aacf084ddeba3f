use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use ferroform_provider::config::RetrySettings;
use ferroform_provider::retry::{WaitStatus, wait_until, with_retry};
use ferroform_provider::{OperationContext, ProviderError};

fn settings(max_attempts: u32) -> RetrySettings {
    RetrySettings {
        max_attempts,
        base_delay_ms: 100,
        max_delay_ms: 1_000,
    }
}

#[tokio::test(start_paused = true)]
async fn retries_conflicts_until_success() {
    let ctx = OperationContext::new();
    let calls = AtomicU32::new(0);

    let result = with_retry(&ctx, &settings(10), Duration::from_secs(60), "replicate", || async {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n < 4 {
            Err(ProviderError::Conflict("primary not yet visible".into()))
        } else {
            Ok(n)
        }
    })
    .await;

    assert_eq!(result.unwrap(), 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn terminal_errors_are_not_retried() {
    let ctx = OperationContext::new();
    let calls = AtomicU32::new(0);

    let result: Result<(), _> =
        with_retry(&ctx, &settings(10), Duration::from_secs(60), "create", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Validation("bad input".into()))
        })
        .await;

    assert!(matches!(result, Err(ProviderError::Validation(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts() {
    let ctx = OperationContext::new();
    let calls = AtomicU32::new(0);

    let result: Result<(), _> =
        with_retry(&ctx, &settings(3), Duration::from_secs(600), "tag", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Transient("throttled".into()))
        })
        .await;

    assert!(matches!(result, Err(ProviderError::Transient(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn gives_up_when_window_elapses() {
    let ctx = OperationContext::new();
    let calls = AtomicU32::new(0);

    // 100 + 200 + 400 ms fits in the window; the next 800 ms does not.
    let result: Result<(), _> =
        with_retry(&ctx, &settings(100), Duration::from_millis(1_000), "replicate", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Conflict("propagating".into()))
        })
        .await;

    assert!(matches!(result, Err(ProviderError::Conflict(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_backoff() {
    let ctx = OperationContext::new();
    let cancel = ctx.cancel.clone();
    let calls = Arc::new(AtomicU32::new(0));

    let task = {
        let calls = calls.clone();
        tokio::spawn(async move {
            with_retry(&ctx, &settings(100), Duration::from_secs(3_600), "replicate", || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ProviderError::Conflict("propagating".into()))
                }
            })
            .await
        })
    };

    tokio::time::sleep(Duration::from_millis(250)).await;
    cancel.cancel();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(ProviderError::Cancelled(_))));
    assert!(calls.load(Ordering::SeqCst) < 5);
}

#[tokio::test(start_paused = true)]
async fn wait_until_returns_when_done() {
    let ctx = OperationContext::new();
    let polls = AtomicU32::new(0);

    let state = wait_until(
        &ctx,
        "key enabled",
        Duration::from_secs(60),
        Duration::from_secs(1),
        || async {
            let n = polls.fetch_add(1, Ordering::SeqCst);
            Ok(match n {
                0 | 1 => WaitStatus::Pending("Creating".to_string()),
                _ => WaitStatus::Done("Enabled"),
            })
        },
    )
    .await
    .unwrap();

    assert_eq!(state, "Enabled");
    assert_eq!(polls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn wait_until_treats_retryable_errors_as_pending() {
    let ctx = OperationContext::new();
    let polls = AtomicU32::new(0);

    let result = wait_until(
        &ctx,
        "workspace active",
        Duration::from_secs(60),
        Duration::from_secs(1),
        || async {
            if polls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ProviderError::Transient("throttled".into()))
            } else {
                Ok(WaitStatus::Done(()))
            }
        },
    )
    .await;

    assert!(result.is_ok());
}

#[tokio::test(start_paused = true)]
async fn wait_until_times_out() {
    let ctx = OperationContext::new();

    let result: Result<(), _> = wait_until(
        &ctx,
        "key enabled",
        Duration::from_secs(10),
        Duration::from_secs(3),
        || async { Ok(WaitStatus::Pending("Creating".to_string())) },
    )
    .await;

    match result {
        Err(ProviderError::Timeout { what, seconds }) => {
            assert_eq!(what, "key enabled");
            assert_eq!(seconds, 10);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn context_deadline_caps_the_wait() {
    let ctx = OperationContext::new().with_timeout(Duration::from_secs(5));

    let result: Result<(), _> = wait_until(
        &ctx,
        "workspace deletion",
        Duration::from_secs(600),
        Duration::from_secs(1),
        || async { Ok(WaitStatus::Pending("DELETING".to_string())) },
    )
    .await;

    assert!(matches!(result, Err(ProviderError::Timeout { seconds: 5, .. })));
}

#[tokio::test(start_paused = true)]
async fn wait_until_stops_on_cancel() {
    let ctx = OperationContext::new();
    ctx.cancel.cancel();

    let result: Result<(), _> = wait_until(
        &ctx,
        "key enabled",
        Duration::from_secs(60),
        Duration::from_secs(1),
        || async { Ok(WaitStatus::Pending("Creating".to_string())) },
    )
    .await;

    assert!(matches!(result, Err(ProviderError::Cancelled(_))));
}
