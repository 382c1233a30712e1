use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::model::BarrierResult;

/// Races a timeout against an event stream, calling `matches` on every
/// event until one matches or the receiver closes or the timeout elapses.
///
/// Takes the receiver by mutable reference rather than by value so a
/// session can reuse the same channel across several successive waits
/// (start, then hot reload, then VM service readiness) without losing
/// events that arrive between them.
pub async fn wait_for_event<T, F>(
    receiver: &mut mpsc::UnboundedReceiver<T>,
    timeout: Duration,
    mut matches: F,
) -> BarrierResult<T>
where
    F: FnMut(&T) -> bool,
{
    let start = Instant::now();
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            _ = &mut deadline => {
                return BarrierResult::Timeout {
                    elapsed: start.elapsed(),
                    diagnostics: format!("no matching event within {timeout:?}"),
                };
            }
            event = receiver.recv() => {
                match event {
                    Some(event) if matches(&event) => {
                        return BarrierResult::Success {
                            value: Some(event),
                            elapsed: start.elapsed(),
                        };
                    }
                    Some(_) => continue,
                    None => {
                        return BarrierResult::Failure {
                            elapsed: start.elapsed(),
                            error: "event stream closed before a match arrived".to_string(),
                            diagnostics: "sender dropped".to_string(),
                        };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_the_first_qualifying_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        tx.send(3).unwrap();

        let result = wait_for_event(&mut rx, Duration::from_secs(1), |v| *v == 2).await;
        assert!(matches!(result, BarrierResult::Success { value: Some(2), .. }));
    }

    #[tokio::test]
    async fn times_out_without_a_match() {
        let (_tx, mut rx) = mpsc::unbounded_channel::<i32>();
        let result = wait_for_event(&mut rx, Duration::from_millis(20), |_| true).await;
        assert!(matches!(result, BarrierResult::Timeout { .. }));
    }

    #[tokio::test]
    async fn closed_channel_before_match_is_a_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel::<i32>();
        drop(tx);
        let result = wait_for_event(&mut rx, Duration::from_secs(1), |_| true).await;
        assert!(matches!(result, BarrierResult::Failure { .. }));
    }
}
