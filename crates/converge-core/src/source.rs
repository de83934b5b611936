//! Snapshot sources
//!
//! Everything the poller consumes is a lazy, possibly infinite
//! [`SnapshotStream`]. Push-based agents are adapted from channels, pull-based
//! agents from a "get latest" accessor polled on a bounded interval. A
//! source that fails yields the error as its last item.

use crate::error::FixtureError;
use converge_state::StateSnapshot;
use futures::stream::{self, BoxStream, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Interval, MissedTickBehavior};

/// Stream of observed snapshots, owned by one run
pub type SnapshotStream = BoxStream<'static, Result<StateSnapshot, FixtureError>>;

/// Lower bound on the pull interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Adapt a watch channel holding the latest snapshot
///
/// Yields the current value first (if any), then every change. Intermediate
/// values overwritten before being read are skipped; latest wins. Ends when
/// the sender is dropped.
#[must_use]
pub fn watch_source(rx: watch::Receiver<Option<StateSnapshot>>) -> SnapshotStream {
    stream::unfold((rx, true), |(mut rx, mut initial)| async move {
        loop {
            if !initial {
                rx.changed().await.ok()?;
            }
            initial = false;
            let current = rx.borrow_and_update().clone();
            if let Some(snapshot) = current {
                return Some((Ok(snapshot), (rx, false)));
            }
        }
    })
    .boxed()
}

/// Adapt an mpsc channel of snapshots; ends when every sender is dropped
#[must_use]
pub fn channel_source(rx: mpsc::Receiver<StateSnapshot>) -> SnapshotStream {
    stream::unfold(rx, |mut rx| async move {
        let snapshot = rx.recv().await?;
        Some((Ok(snapshot), rx))
    })
    .boxed()
}

/// Poll a "get latest" accessor every `period`
///
/// `Ok(None)` means no state is available yet and is skipped. An error is
/// yielded once and ends the stream. Missed ticks are delayed rather than
/// burst.
#[must_use]
pub fn polling_source<F, Fut>(fetch: F, period: Duration) -> SnapshotStream
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<StateSnapshot>, FixtureError>> + Send + 'static,
{
    let period = period.max(MIN_POLL_INTERVAL);
    stream::unfold(
        Some((fetch, None::<Interval>)),
        move |state| async move {
            let (mut fetch, ticker) = state?;
            let mut ticker = ticker.unwrap_or_else(|| {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });
            loop {
                ticker.tick().await;
                match fetch().await {
                    Ok(Some(snapshot)) => return Some((Ok(snapshot), Some((fetch, Some(ticker))))),
                    Ok(None) => {}
                    Err(err) => {
                        tracing::error!(error = %err, "state accessor failed, ending poll");
                        return Some((Err(err), None));
                    }
                }
            }
        },
    )
    .boxed()
}
