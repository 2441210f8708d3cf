// ── Generic keyed reconciler ──
//
// Concurrent storage with a per-key acceptance decision, a `watch`
// snapshot for readers, and a `broadcast` feed of accepted changes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{broadcast, watch};
use tracing::trace;

use crate::stream::SnapshotStream;

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// Read-only id → record mapping.
pub type Snapshot<T> = Arc<HashMap<String, Arc<T>>>;

/// Outcome of offering an update to the current record.
#[derive(Debug, Clone, PartialEq)]
pub enum Acceptance<T> {
    Accepted(T),
    /// Out of order; dropped without error.
    Stale,
}

/// How updates of one kind fold into records.
pub trait Reconcile: Sized + Send + Sync + 'static {
    type Update: Send;

    /// Short name for logs.
    const KIND: &'static str;

    fn key(update: &Self::Update) -> &str;

    /// Decide the new record given the current one (if any).
    fn reconcile(current: Option<&Self>, update: Self::Update) -> Acceptance<Self>;
}

/// One accepted update.
#[derive(Debug)]
pub struct Change<T> {
    pub id: String,
    pub record: Arc<T>,
}

impl<T> Clone for Change<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            record: Arc::clone(&self.record),
        }
    }
}

/// Keyed state for one entity kind.
pub struct Reconciler<T: Reconcile> {
    records: DashMap<String, Arc<T>>,
    snapshot: watch::Sender<Snapshot<T>>,
    changes: broadcast::Sender<Change<T>>,
    stale: AtomicU64,
}

impl<T: Reconcile> Default for Reconciler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Reconcile> Reconciler<T> {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(HashMap::new()));
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            records: DashMap::new(),
            snapshot,
            changes,
            stale: AtomicU64::new(0),
        }
    }

    /// Offer one update. Returns the new record if it was accepted.
    pub fn apply(&self, update: T::Update) -> Option<Arc<T>> {
        let accepted = self.decide(update)?;
        self.rebuild_snapshot();
        let _ = self.changes.send(accepted.clone());
        Some(accepted.record)
    }

    /// Offer many updates through the same rule, publishing one snapshot
    /// at the end. Returns how many were accepted.
    pub fn seed(&self, updates: impl IntoIterator<Item = T::Update>) -> usize {
        let mut accepted = Vec::new();
        for update in updates {
            if let Some(change) = self.decide(update) {
                accepted.push(change);
            }
        }
        if !accepted.is_empty() {
            self.rebuild_snapshot();
        }
        let n = accepted.len();
        for change in accepted {
            let _ = self.changes.send(change);
        }
        n
    }

    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        self.records.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Snapshot<T> {
        self.snapshot.borrow().clone()
    }

    /// Snapshot stream for async consumers.
    pub fn stream(&self) -> SnapshotStream<T> {
        SnapshotStream::new(self.snapshot.subscribe())
    }

    /// Per-update change feed.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<Change<T>> {
        self.changes.subscribe()
    }

    /// How many updates have been dropped as stale.
    pub fn stale_discards(&self) -> u64 {
        self.stale.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// The acceptance critical section. The entry guard keeps the
    /// read-decide-write for one key atomic.
    fn decide(&self, update: T::Update) -> Option<Change<T>> {
        let id = T::key(&update).to_owned();
        let outcome = match self.records.entry(id.clone()) {
            Entry::Occupied(mut entry) => match T::reconcile(Some(entry.get().as_ref()), update) {
                Acceptance::Accepted(record) => {
                    let record = Arc::new(record);
                    entry.insert(Arc::clone(&record));
                    Some(record)
                }
                Acceptance::Stale => None,
            },
            Entry::Vacant(entry) => match T::reconcile(None, update) {
                Acceptance::Accepted(record) => {
                    let record = Arc::new(record);
                    entry.insert(Arc::clone(&record));
                    Some(record)
                }
                Acceptance::Stale => None,
            },
        };

        if outcome.is_none() {
            self.stale.fetch_add(1, Ordering::Relaxed);
            trace!(kind = T::KIND, %id, "stale update discarded");
        }
        outcome.map(|record| Change { id, record })
    }

    fn rebuild_snapshot(&self) {
        let values: HashMap<String, Arc<T>> = self
            .records
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
