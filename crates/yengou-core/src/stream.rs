// ── Reactive snapshot streams ──
//
// Subscription type for consuming reconciler changes asynchronously.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::{Reconcile, Snapshot};

/// A subscription to one reconciler's snapshot.
///
/// Provides both point-in-time access and change notification via
/// `changed()` or by converting to a `Stream`.
pub struct SnapshotStream<T: Reconcile> {
    current: Snapshot<T>,
    receiver: watch::Receiver<Snapshot<T>>,
}

impl<T: Reconcile> SnapshotStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot<T>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Snapshot<T> {
        &self.current
    }

    /// The latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Snapshot<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the reconciler has been dropped.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// Yields the current snapshot first, then one per change.
    pub fn into_stream(self) -> SnapshotWatchStream<T> {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct SnapshotWatchStream<T: Reconcile> {
    inner: WatchStream<Snapshot<T>>,
}

impl<T: Reconcile> Stream for SnapshotWatchStream<T> {
    type Item = Snapshot<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::StreamExt;
    use yengou_api::wire::{TripStatus, TripUpdate};

    use crate::model::Trip;
    use crate::store::Reconciler;

    #[tokio::test]
    async fn changed_yields_new_snapshot() {
        let trips: Reconciler<Trip> = Reconciler::new();
        let mut stream = trips.stream();
        assert!(stream.current().is_empty());

        trips.apply(TripUpdate::new("T1").with_status(TripStatus::Pending));

        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(stream.current().len(), 1);
    }

    #[tokio::test]
    async fn into_stream_starts_with_current() {
        let trips: Reconciler<Trip> = Reconciler::new();
        trips.apply(TripUpdate::new("T1"));

        let mut stream = trips.stream().into_stream();
        let first = stream.next().await.unwrap();
        assert!(first.contains_key("T1"));
    }
}
