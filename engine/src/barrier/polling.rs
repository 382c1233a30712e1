use std::future::Future;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::model::BarrierResult;

/// Repeatedly calls `check` until it returns `Some(value)` or `timeout`
/// elapses. Sleeps `interval` between attempts, so the first check runs
/// immediately.
///
/// Transient errors from `check` are logged and swallowed, not surfaced as
/// failure — a barrier times out rather than aborting early just because
/// one poll hit a flaky ADB invocation or dropped connection. `diagnostics`
/// is called exactly once, only along the timeout path, so a barrier can
/// build a message from whatever state it accumulated across polls without
/// paying that cost on every iteration.
pub async fn poll_until<F, Fut, T, D, DFut>(
    timeout: Duration,
    interval: Duration,
    mut check: F,
    diagnostics: D,
) -> BarrierResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, String>>,
    D: FnOnce() -> DFut,
    DFut: Future<Output = String>,
{
    let start = Instant::now();

    loop {
        match check().await {
            Ok(Some(value)) => {
                return BarrierResult::Success {
                    value: Some(value),
                    elapsed: start.elapsed(),
                };
            }
            Ok(None) => {}
            Err(error) => {
                debug!(error, "barrier poll check errored, continuing");
            }
        }

        if start.elapsed() >= timeout {
            return BarrierResult::Timeout {
                elapsed: start.elapsed(),
                diagnostics: diagnostics().await,
            };
        }

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_once_condition_is_met() {
        let attempts = AtomicU32::new(0);
        let result = poll_until(
            Duration::from_secs(1),
            Duration::from_millis(1),
            || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n >= 2 {
                    Ok(Some(n))
                } else {
                    Ok(None)
                }
            },
            || async { "unreachable".to_string() },
        )
        .await;

        assert!(result.is_success());
    }

    #[tokio::test]
    async fn times_out_when_condition_never_met() {
        let result: BarrierResult<()> = poll_until(
            Duration::from_millis(20),
            Duration::from_millis(5),
            || async { Ok(None) },
            || async { "never ready".to_string() },
        )
        .await;

        assert!(matches!(result, BarrierResult::Timeout { .. }));
    }

    #[tokio::test]
    async fn swallows_check_errors_and_keeps_polling() {
        let attempts = AtomicU32::new(0);
        let result = poll_until(
            Duration::from_secs(1),
            Duration::from_millis(1),
            || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err("transient".to_string())
                } else {
                    Ok(Some(n))
                }
            },
            || async { "unreachable".to_string() },
        )
        .await;

        assert!(result.is_success());
        assert!(attempts.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test]
    async fn persistent_check_errors_eventually_time_out() {
        let result: BarrierResult<()> = poll_until(
            Duration::from_millis(20),
            Duration::from_millis(5),
            || async { Err("boom".to_string()) },
            || async { "still erroring".to_string() },
        )
        .await;

        assert!(matches!(result, BarrierResult::Timeout { .. }));
    }
}
