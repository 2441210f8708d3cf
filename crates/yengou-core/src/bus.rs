//! In-process publish/subscribe fan-out.
//!
//! Sits above the connection manager: inbound frames and connection
//! lifecycle changes are published here as typed [`BusEvent`]s, and any
//! number of independent consumers subscribe per [`Topic`].
//!
//! Delivery is synchronous and in registration order. Each topic's
//! subscriber list is copy-on-write, so `publish` walks an immutable
//! snapshot: handlers may subscribe or unsubscribe mid-delivery without
//! disturbing the in-flight publish, and a handler registered during
//! delivery does not see it. A panicking handler is logged and skipped;
//! the remaining handlers still run.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};
use tokio::sync::mpsc;
use tracing::{error, trace};
use yengou_api::wire::{
    DashboardStats, DriverLocationUpdate, ServiceMatchUpdate, SystemAlert, SystemNotification,
    TripUpdate,
};

// ── Topics and events ────────────────────────────────────────────────

/// Every stream a consumer can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Topic {
    Connected,
    Disconnected,
    ConnectionError,
    DriverLocation,
    TripUpdate,
    ServiceMatch,
    Notification,
    DashboardStats,
    SystemAlert,
}

/// Why the connection went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called. Subscription state is cleared.
    ClientRequested,
    /// `connect()` was called with a different credential; a new
    /// connection follows immediately.
    CredentialChanged,
    /// The socket dropped. The transport is reconnecting.
    Transport(String),
}

/// Payload of a `ConnectionError` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionFault {
    pub detail: String,
    /// `false` once the transport has given up; a caller must reconnect.
    pub will_retry: bool,
}

/// A published event. Payloads are shared, never copied per subscriber.
#[derive(Debug, Clone)]
pub enum BusEvent {
    Connected,
    Disconnected(DisconnectReason),
    ConnectionError(ConnectionFault),
    DriverLocation(Arc<DriverLocationUpdate>),
    TripUpdate(Arc<TripUpdate>),
    ServiceMatch(Arc<ServiceMatchUpdate>),
    Notification(Arc<SystemNotification>),
    DashboardStats(Arc<DashboardStats>),
    SystemAlert(Arc<SystemAlert>),
}

impl BusEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::Connected => Topic::Connected,
            Self::Disconnected(_) => Topic::Disconnected,
            Self::ConnectionError(_) => Topic::ConnectionError,
            Self::DriverLocation(_) => Topic::DriverLocation,
            Self::TripUpdate(_) => Topic::TripUpdate,
            Self::ServiceMatch(_) => Topic::ServiceMatch,
            Self::Notification(_) => Topic::Notification,
            Self::DashboardStats(_) => Topic::DashboardStats,
            Self::SystemAlert(_) => Topic::SystemAlert,
        }
    }
}

// ── EventBus ─────────────────────────────────────────────────────────

type Handler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

#[derive(Clone)]
struct Registration {
    id: u64,
    handler: Handler,
}

/// Identifies one registration. Passing it to
/// [`EventBus::unsubscribe`] more than once is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    topic: Topic,
    id: u64,
}

impl SubscriptionToken {
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

/// Typed in-process fan-out.
pub struct EventBus {
    topics: HashMap<Topic, ArcSwap<Vec<Registration>>>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let topics = Topic::iter()
            .map(|t| (t, ArcSwap::from_pointee(Vec::new())))
            .collect();
        Self {
            topics,
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` for `topic`.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionToken
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let registration = Registration {
            id,
            handler: Arc::new(handler),
        };

        if let Some(list) = self.topics.get(&topic) {
            list.rcu(|current| {
                let mut next = Vec::clone(current);
                next.push(registration.clone());
                next
            });
        }

        trace!(%topic, id, "bus subscription added");
        SubscriptionToken { topic, id }
    }

    /// Remove exactly the registration behind `token`.
    ///
    /// Returns `true` if it was still registered.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let Some(list) = self.topics.get(&token.topic) else {
            return false;
        };
        let previous = list.rcu(|current| {
            current
                .iter()
                .filter(|r| r.id != token.id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|r| r.id == token.id)
    }

    /// Deliver `event` to every current subscriber of its topic.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, event: &BusEvent) -> usize {
        let Some(list) = self.topics.get(&event.topic()) else {
            return 0;
        };
        let subscribers = list.load_full();
        for registration in subscribers.iter() {
            if catch_unwind(AssertUnwindSafe(|| (registration.handler)(event))).is_err() {
                error!(topic = %event.topic(), "bus handler panicked");
            }
        }
        subscribers.len()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topics.get(&topic).map_or(0, |list| list.load().len())
    }

    /// Adapt a set of topics to an async receiver.
    ///
    /// The registrations live as long as the returned [`BusReceiver`].
    pub fn channel(self: &Arc<Self>, topics: &[Topic]) -> BusReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let tokens = topics
            .iter()
            .map(|&topic| {
                let tx = tx.clone();
                self.subscribe(topic, move |event| {
                    let _ = tx.send(event.clone());
                })
            })
            .collect();

        BusReceiver {
            rx,
            tokens,
            bus: Arc::downgrade(self),
        }
    }
}

// ── BusReceiver ──────────────────────────────────────────────────────

/// Async view of selected bus topics. Unsubscribes on drop.
pub struct BusReceiver {
    rx: mpsc::UnboundedReceiver<BusEvent>,
    tokens: Vec<SubscriptionToken>,
    bus: Weak<EventBus>,
}

impl BusReceiver {
    /// Next event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BusEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for BusReceiver {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            for token in self.tokens.drain(..) {
                bus.unsubscribe(token);
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&BusEvent) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = Arc::clone(&log);
        let make = move |name: &str| -> Box<dyn Fn(&BusEvent) + Send + Sync> {
            let log = Arc::clone(&log2);
            let name = name.to_owned();
            Box::new(move |_event: &BusEvent| log.lock().unwrap().push(name.clone()))
        };
        (log, make)
    }

    #[test]
    fn delivers_in_registration_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();

        bus.subscribe(Topic::Connected, make("a"));
        bus.subscribe(Topic::Connected, make("b"));
        bus.subscribe(Topic::Disconnected, make("other"));

        assert_eq!(bus.publish(&BusEvent::Connected), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let (log, make) = recorder();

        let token = bus.subscribe(Topic::Connected, make("a"));
        assert!(bus.unsubscribe(token));
        assert!(!bus.unsubscribe(token));

        assert_eq!(bus.publish(&BusEvent::Connected), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn unsubscribe_removes_only_that_registration() {
        let bus = EventBus::new();
        let (log, make) = recorder();

        let first = bus.subscribe(Topic::Connected, make("a"));
        bus.subscribe(Topic::Connected, make("a"));
        bus.unsubscribe(first);

        bus.publish(&BusEvent::Connected);
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn subscribe_during_publish_misses_in_flight_event() {
        let bus = Arc::new(EventBus::new());
        let late_calls = Arc::new(AtomicU64::new(0));

        let bus2 = Arc::clone(&bus);
        let late = Arc::clone(&late_calls);
        bus.subscribe(Topic::Connected, move |_| {
            let late = Arc::clone(&late);
            bus2.subscribe(Topic::Connected, move |_| {
                late.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(bus.publish(&BusEvent::Connected), 1);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(Topic::Connected), 2);

        // The late subscriber sees the next publish.
        bus.publish(&BusEvent::Connected);
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_during_publish_does_not_skip_others() {
        let bus = Arc::new(EventBus::new());
        let (log, make) = recorder();

        let token_slot: Arc<Mutex<Option<SubscriptionToken>>> = Arc::new(Mutex::new(None));
        let bus2 = Arc::clone(&bus);
        let slot = Arc::clone(&token_slot);
        bus.subscribe(Topic::Connected, move |_| {
            if let Some(token) = slot.lock().unwrap().take() {
                bus2.unsubscribe(token);
            }
        });
        let b = bus.subscribe(Topic::Connected, make("b"));
        bus.subscribe(Topic::Connected, make("c"));
        *token_slot.lock().unwrap() = Some(b);

        bus.publish(&BusEvent::Connected);
        // Snapshot taken before delivery: b still sees this one.
        assert_eq!(*log.lock().unwrap(), vec!["b", "c"]);

        bus.publish(&BusEvent::Connected);
        assert_eq!(*log.lock().unwrap(), vec!["b", "c", "c"]);
    }

    #[tokio::test]
    async fn channel_unsubscribes_on_drop() {
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.channel(&[Topic::Connected, Topic::Disconnected]);
        assert_eq!(bus.subscriber_count(Topic::Connected), 1);

        bus.publish(&BusEvent::Disconnected(DisconnectReason::ClientRequested));
        match rx.recv().await.unwrap() {
            BusEvent::Disconnected(DisconnectReason::ClientRequested) => {}
            other => panic!("unexpected {other:?}"),
        }

        drop(rx);
        assert_eq!(bus.subscriber_count(Topic::Connected), 0);
        assert_eq!(bus.subscriber_count(Topic::Disconnected), 0);
    }

    #[test]
    fn panicking_handler_does_not_stop_delivery() {
        let bus = EventBus::new();
        let (log, make) = recorder();

        bus.subscribe(Topic::Connected, |_: &BusEvent| panic!("handler bug"));
        bus.subscribe(Topic::Connected, make("after"));

        assert_eq!(bus.publish(&BusEvent::Connected), 2);
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn every_topic_is_routable() {
        let bus = EventBus::new();
        for topic in Topic::iter() {
            assert_eq!(bus.subscriber_count(topic), 0);
        }
        assert_eq!(Topic::ConnectionError.to_string(), "connection-error");
    }
}
