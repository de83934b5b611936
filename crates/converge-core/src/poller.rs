//! Convergence poller
//!
//! Evaluates each snapshot from a source until one matches, racing the
//! source against the context's deadline and cancellation. The poller only
//! observes cancellation; deciding to abort belongs to the caller.

use crate::context::RunContext;
use crate::error::{FixtureError, WaitError};
use converge_state::{MatchReport, StateSnapshot};
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::time::Instant;

/// Successful wait statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Converged {
    /// Snapshots evaluated, including the matching one
    pub snapshots_seen: usize,
    /// Time from the start of the wait to the match
    pub waited: Duration,
}

/// Wait until `match_fn` accepts a snapshot from `source`
///
/// Returns as soon as a snapshot matches. Otherwise fails with the report of
/// the last evaluated snapshot once the deadline passes, the context is
/// cancelled, or the source ends or fails. The source is borrowed, so a later call
/// with a fresh context continues from where this one stopped.
///
/// # Errors
/// - `WaitError::Cancelled` if the context is cancelled first
/// - `WaitError::Timeout` if the deadline passes first
/// - `WaitError::SourceClosed` if the source ends without a match
/// - `WaitError::Source` if the source yields an error
pub async fn wait_for_match<S, F>(
    ctx: &RunContext,
    source: &mut S,
    mut match_fn: F,
) -> Result<Converged, WaitError>
where
    S: Stream<Item = Result<StateSnapshot, FixtureError>> + Unpin,
    F: FnMut(&StateSnapshot) -> MatchReport,
{
    let started = Instant::now();
    let deadline = tokio::time::sleep_until(ctx.deadline());
    tokio::pin!(deadline);

    let mut last = MatchReport::no_snapshot();
    let mut snapshots_seen = 0usize;

    loop {
        tokio::select! {
            biased;

            () = ctx.cancelled() => {
                tracing::warn!(snapshots_seen, "wait cancelled before convergence");
                return Err(WaitError::Cancelled { last });
            }
            () = &mut deadline => {
                let waited = started.elapsed();
                tracing::warn!(?waited, snapshots_seen, "wait timed out before convergence");
                return Err(WaitError::Timeout { waited, last });
            }
            next = source.next() => {
                let snapshot = match next {
                    Some(Ok(snapshot)) => snapshot,
                    Some(Err(error)) => {
                        tracing::error!(%error, snapshots_seen, "state source failed before convergence");
                        return Err(WaitError::Source { error, last });
                    }
                    None => {
                        tracing::warn!(snapshots_seen, "state source closed before convergence");
                        return Err(WaitError::SourceClosed { last });
                    }
                };
                snapshots_seen += 1;
                let report = match_fn(&snapshot);
                if report.is_match() {
                    return Ok(Converged {
                        snapshots_seen,
                        waited: started.elapsed(),
                    });
                }
                tracing::debug!(mismatches = report.len(), "snapshot does not match yet");
                last = report;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::channel_source;
    use converge_state::{ClientState, ExpectationStep, Mismatch};
    use futures::stream;
    use tokio::sync::mpsc;

    fn healthy_step() -> ExpectationStep {
        ExpectationStep::new("", ClientState::Healthy)
    }

    fn snapshots<const N: usize>(
        states: [ClientState; N],
    ) -> impl Stream<Item = Result<StateSnapshot, FixtureError>> + Unpin {
        stream::iter(states.map(|state| Ok(StateSnapshot::new(state))))
    }

    #[tokio::test(start_paused = true)]
    async fn returns_on_first_match() {
        let step = healthy_step();
        let mut source = snapshots([
            ClientState::Starting,
            ClientState::Configuring,
            ClientState::Healthy,
            ClientState::Failed,
        ]);
        let ctx = RunContext::with_timeout(Duration::from_secs(1));

        let done = wait_for_match(&ctx, &mut source, |s| step.evaluate(s))
            .await
            .unwrap();
        assert_eq!(done.snapshots_seen, 3);

        // The remaining snapshot was not consumed.
        assert_eq!(
            source.next().await.map(|s| s.map(|s| s.agent.state)),
            Some(Ok(ClientState::Failed))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_waits_full_deadline_and_keeps_last_diagnostic() {
        let step = healthy_step();
        let mut source = snapshots([ClientState::Degraded]).chain(stream::pending());
        let ctx = RunContext::with_timeout(Duration::from_secs(3));
        let started = Instant::now();

        let err = wait_for_match(&ctx, &mut source, |s| step.evaluate(s))
            .await
            .unwrap_err();

        assert_eq!(started.elapsed(), Duration::from_secs(3));
        match err {
            WaitError::Timeout { waited, last } => {
                assert_eq!(waited, Duration::from_secs(3));
                assert_eq!(
                    last.mismatches(),
                    &[Mismatch::AgentState {
                        expected: ClientState::Healthy,
                        observed: ClientState::Degraded,
                    }]
                );
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_without_snapshots_says_so() {
        let step = healthy_step();
        let mut source = stream::pending::<Result<StateSnapshot, FixtureError>>();
        let ctx = RunContext::with_timeout(Duration::from_millis(100));

        let err = wait_for_match(&ctx, &mut source, |s| step.evaluate(s))
            .await
            .unwrap_err();
        assert_eq!(err.last_report(), &MatchReport::no_snapshot());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_unblocks_wait() {
        let step = healthy_step();
        let (_tx, rx) = mpsc::channel(1);
        let mut source = channel_source(rx);
        let ctx = RunContext::with_timeout(Duration::from_secs(600));

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let err = wait_for_match(&ctx, &mut source, |s| step.evaluate(s))
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Cancelled { .. }));
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn closed_source_fails_fast() {
        let step = healthy_step();
        let mut source = snapshots([ClientState::Stopped]);
        let ctx = RunContext::with_timeout(Duration::from_secs(600));

        let err = wait_for_match(&ctx, &mut source, |s| step.evaluate(s))
            .await
            .unwrap_err();
        match err {
            WaitError::SourceClosed { last } => assert_eq!(last.len(), 1),
            other => panic!("expected closed source, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn source_error_ends_wait_with_cause() {
        let step = healthy_step();
        let mut source = snapshots([ClientState::Configuring])
            .chain(stream::iter([Err(FixtureError::Unsupported("polling".to_string()))]))
            .chain(stream::pending());
        let ctx = RunContext::with_timeout(Duration::from_secs(600));
        let started = Instant::now();

        let err = wait_for_match(&ctx, &mut source, |s| step.evaluate(s))
            .await
            .unwrap_err();
        assert_eq!(started.elapsed(), Duration::ZERO);
        match err {
            WaitError::Source { error, last } => {
                assert_eq!(error, FixtureError::Unsupported("polling".to_string()));
                assert_eq!(last.len(), 1);
            }
            other => panic!("expected source failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn wait_can_be_repeated_after_timeout() {
        let step = healthy_step();
        let (tx, rx) = mpsc::channel(4);
        let mut source = channel_source(rx);

        let first = RunContext::with_timeout(Duration::from_secs(1));
        assert!(wait_for_match(&first, &mut source, |s| step.evaluate(s))
            .await
            .is_err());

        tx.send(StateSnapshot::new(ClientState::Healthy)).await.unwrap();
        let second = RunContext::with_timeout(Duration::from_secs(1));
        let done = wait_for_match(&second, &mut source, |s| step.evaluate(s))
            .await
            .unwrap();
        assert_eq!(done.snapshots_seen, 1);
    }
}
