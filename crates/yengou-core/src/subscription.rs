//! Reference-counted subscription scopes.
//!
//! Several surfaces may want the same stream (the map and a detail panel
//! both watching driver `D2`). The coordinator counts interest per
//! [`Scope`] and only talks to the server on the edges: `subscribe:*` when
//! the count leaves zero, `unsubscribe:*` when it returns to zero.
//!
//! Interest registered while offline is remembered and flushed when the
//! connection reports `Connected`; the same replay re-establishes every
//! live scope after a reconnect.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use strum::{Display, IntoStaticStr};
use tracing::{debug, error, info};
use yengou_api::wire::OutboundFrame;

use crate::bus::{BusEvent, DisconnectReason, EventBus, SubscriptionToken, Topic};

// ── Scopes ───────────────────────────────────────────────────────────

/// Category of subscribable stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, IntoStaticStr, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Driver,
    Trip,
    Dashboard,
}

/// One subscribable stream instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Driver(String),
    Trip(String),
    Dashboard,
}

impl Scope {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Driver(_) => EntityKind::Driver,
            Self::Trip(_) => EntityKind::Trip,
            Self::Dashboard => EntityKind::Dashboard,
        }
    }

    pub fn subscribe_frame(&self) -> OutboundFrame {
        match self {
            Self::Driver(id) => OutboundFrame::SubscribeDriver {
                driver_id: id.clone(),
            },
            Self::Trip(id) => OutboundFrame::SubscribeTrip { trip_id: id.clone() },
            Self::Dashboard => OutboundFrame::SubscribeDashboard,
        }
    }

    pub fn unsubscribe_frame(&self) -> OutboundFrame {
        match self {
            Self::Driver(id) => OutboundFrame::UnsubscribeDriver {
                driver_id: id.clone(),
            },
            Self::Trip(id) => OutboundFrame::UnsubscribeTrip { trip_id: id.clone() },
            Self::Dashboard => OutboundFrame::UnsubscribeDashboard,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver(id) => write!(f, "driver:{id}"),
            Self::Trip(id) => write!(f, "trip:{id}"),
            Self::Dashboard => f.write_str("dashboard"),
        }
    }
}

// ── Control sink ─────────────────────────────────────────────────────

/// Where scope control frames go. Implemented by the connection
/// manager's control channel; tests substitute a recorder.
pub trait ControlSink: Send + Sync {
    fn send_control(&self, frame: OutboundFrame);
}

// ── Coordinator ──────────────────────────────────────────────────────

#[derive(Default)]
struct CoordinatorState {
    counts: BTreeMap<Scope, usize>,
    connected: bool,
    /// Bumped on client disconnect; older handles release as no-ops.
    generation: u64,
}

/// Reference-counts scopes and emits subscribe/unsubscribe frames on the
/// 0↔1 edges.
pub struct SubscriptionCoordinator {
    state: Mutex<CoordinatorState>,
    sink: Arc<dyn ControlSink>,
}

impl SubscriptionCoordinator {
    pub fn new(sink: Arc<dyn ControlSink>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(CoordinatorState::default()),
            sink,
        })
    }

    /// Follow connection lifecycle events published on `bus`.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> Vec<SubscriptionToken> {
        let weak = Arc::downgrade(self);
        let on_connected = bus.subscribe(Topic::Connected, move |_| {
            if let Some(this) = weak.upgrade() {
                this.on_connected();
            }
        });

        let weak = Arc::downgrade(self);
        let on_disconnected = bus.subscribe(Topic::Disconnected, move |event| {
            let Some(this) = weak.upgrade() else { return };
            if let BusEvent::Disconnected(reason) = event {
                match reason {
                    DisconnectReason::ClientRequested => this.reset(),
                    DisconnectReason::CredentialChanged | DisconnectReason::Transport(_) => {
                        this.on_transport_lost();
                    }
                }
            }
        });

        vec![on_connected, on_disconnected]
    }

    /// Register interest in `scope`.
    ///
    /// The first acquirer triggers `subscribe:*` if connected; otherwise
    /// the intent is held until the next `Connected`.
    pub fn acquire(self: &Arc<Self>, scope: Scope) -> ScopeHandle {
        let mut state = self.lock();
        let count = state.counts.entry(scope.clone()).or_insert(0);
        *count += 1;
        let first = *count == 1;

        if first && state.connected {
            debug!(%scope, "subscribing");
            self.sink.send_control(scope.subscribe_frame());
        } else if first {
            debug!(%scope, "queued until connected");
        }

        ScopeHandle {
            scope,
            generation: state.generation,
            coordinator: Arc::downgrade(self),
        }
    }

    /// Drop interest held by `handle`. Same as dropping it.
    pub fn release(&self, handle: ScopeHandle) {
        drop(handle);
    }

    /// Current interest count for `scope`.
    pub fn ref_count(&self, scope: &Scope) -> usize {
        self.lock().counts.get(scope).copied().unwrap_or(0)
    }

    /// Every scope with at least one holder.
    pub fn active_scopes(&self) -> Vec<Scope> {
        self.lock().counts.keys().cloned().collect()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    // ── Lifecycle reactions ──────────────────────────────────────────

    /// (Re)send every live scope.
    pub fn on_connected(&self) -> usize {
        let mut state = self.lock();
        state.connected = true;
        for scope in state.counts.keys() {
            self.sink.send_control(scope.subscribe_frame());
        }
        let n = state.counts.len();
        if n > 0 {
            info!(scopes = n, "replayed subscription scopes");
        }
        n
    }

    /// Socket lost; scopes are kept for replay.
    pub fn on_transport_lost(&self) {
        self.lock().connected = false;
    }

    /// Client-initiated disconnect: forget everything.
    pub fn reset(&self) {
        let mut state = self.lock();
        let dropped = state.counts.len();
        state.counts.clear();
        state.connected = false;
        state.generation += 1;
        debug!(dropped, generation = state.generation, "subscription state cleared");
    }

    // ── Internals ────────────────────────────────────────────────────

    fn release_scope(&self, scope: &Scope, generation: u64) {
        let mut state = self.lock();
        if generation != state.generation {
            debug!(%scope, "released handle from a previous session");
            return;
        }

        debug_assert!(
            state.counts.contains_key(scope),
            "SubscriptionLeak: {scope} released more times than acquired"
        );
        let Some(count) = state.counts.get_mut(scope) else {
            error!(%scope, "subscription released more times than acquired");
            return;
        };

        *count -= 1;
        if *count == 0 {
            state.counts.remove(scope);
            if state.connected {
                debug!(%scope, "unsubscribing");
                self.sink.send_control(scope.unsubscribe_frame());
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── ScopeHandle ──────────────────────────────────────────────────────

/// Proof of interest in one scope. Releases on drop.
#[must_use = "dropping a ScopeHandle releases the subscription immediately"]
pub struct ScopeHandle {
    scope: Scope,
    generation: u64,
    coordinator: Weak<SubscriptionCoordinator>,
}

impl ScopeHandle {
    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHandle")
            .field("scope", &self.scope)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        if let Some(coordinator) = self.coordinator.upgrade() {
            coordinator.release_scope(&self.scope, self.generation);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<OutboundFrame>>);

    impl ControlSink for Recorder {
        fn send_control(&self, frame: OutboundFrame) {
            self.0.lock().unwrap().push(frame);
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<OutboundFrame> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    fn setup(connected: bool) -> (Arc<Recorder>, Arc<SubscriptionCoordinator>) {
        let sink = Arc::new(Recorder::default());
        let coordinator = SubscriptionCoordinator::new(Arc::clone(&sink) as Arc<dyn ControlSink>);
        if connected {
            coordinator.on_connected();
        }
        (sink, coordinator)
    }

    fn sub_driver(id: &str) -> OutboundFrame {
        OutboundFrame::SubscribeDriver {
            driver_id: id.into(),
        }
    }

    fn unsub_driver(id: &str) -> OutboundFrame {
        OutboundFrame::UnsubscribeDriver {
            driver_id: id.into(),
        }
    }

    #[test]
    fn two_observers_one_subscription() {
        let (sink, coord) = setup(true);
        let scope = Scope::Driver("D2".into());

        let a = coord.acquire(scope.clone());
        let b = coord.acquire(scope.clone());
        assert_eq!(sink.take(), vec![sub_driver("D2")]);
        assert_eq!(coord.ref_count(&scope), 2);

        coord.release(a);
        assert_eq!(coord.ref_count(&scope), 1);
        assert!(sink.take().is_empty());

        coord.release(b);
        assert_eq!(coord.ref_count(&scope), 0);
        assert_eq!(sink.take(), vec![unsub_driver("D2")]);
    }

    #[test]
    fn balanced_acquire_release_for_any_n() {
        for n in 1..=8 {
            let (sink, coord) = setup(true);
            let handles: Vec<_> = (0..n)
                .map(|_| coord.acquire(Scope::Trip("T1".into())))
                .collect();
            drop(handles);

            let frames = sink.take();
            assert_eq!(
                frames,
                vec![
                    OutboundFrame::SubscribeTrip { trip_id: "T1".into() },
                    OutboundFrame::UnsubscribeTrip { trip_id: "T1".into() },
                ],
                "n = {n}"
            );
        }
    }

    #[test]
    fn acquire_while_offline_is_flushed_on_connect() {
        let (sink, coord) = setup(false);
        let _dash = coord.acquire(Scope::Dashboard);
        let _d1 = coord.acquire(Scope::Driver("D1".into()));
        assert!(sink.take().is_empty());

        assert_eq!(coord.on_connected(), 2);
        assert_eq!(
            sink.take(),
            vec![sub_driver("D1"), OutboundFrame::SubscribeDashboard]
        );
    }

    #[test]
    fn transport_loss_keeps_scopes_for_replay() {
        let (sink, coord) = setup(true);
        let _d1 = coord.acquire(Scope::Driver("D1".into()));
        sink.take();

        coord.on_transport_lost();
        // Released while offline: no frame, count drops.
        let extra = coord.acquire(Scope::Driver("D9".into()));
        drop(extra);
        assert!(sink.take().is_empty());

        coord.on_connected();
        assert_eq!(sink.take(), vec![sub_driver("D1")]);
    }

    #[test]
    fn reset_invalidates_old_handles() {
        let (sink, coord) = setup(true);
        let scope = Scope::Driver("D1".into());
        let old = coord.acquire(scope.clone());
        coord.reset();
        assert!(coord.active_scopes().is_empty());

        coord.on_connected();
        let fresh = coord.acquire(scope.clone());
        sink.take();

        // The stale handle must not decrement the new session's count.
        drop(old);
        assert_eq!(coord.ref_count(&scope), 1);
        assert!(sink.take().is_empty());

        drop(fresh);
        assert_eq!(sink.take(), vec![unsub_driver("D1")]);
    }

    #[test]
    fn follows_bus_lifecycle() {
        let bus = EventBus::new();
        let (sink, coord) = setup(false);
        coord.attach(&bus);

        let _h = coord.acquire(Scope::Trip("T7".into()));
        bus.publish(&BusEvent::Connected);
        assert!(coord.is_connected());
        assert_eq!(
            sink.take(),
            vec![OutboundFrame::SubscribeTrip { trip_id: "T7".into() }]
        );

        bus.publish(&BusEvent::Disconnected(DisconnectReason::Transport(
            "reset by peer".into(),
        )));
        assert!(!coord.is_connected());
        assert_eq!(coord.active_scopes(), vec![Scope::Trip("T7".into())]);

        bus.publish(&BusEvent::Disconnected(DisconnectReason::ClientRequested));
        assert!(coord.active_scopes().is_empty());
    }

    #[test]
    fn scope_display_and_kind() {
        assert_eq!(Scope::Driver("D1".into()).to_string(), "driver:D1");
        assert_eq!(Scope::Dashboard.kind(), EntityKind::Dashboard);
        assert_eq!(EntityKind::Trip.to_string(), "trip");
    }
}
