// ── Connection manager ──
//
// Owns the single realtime connection. Translates transport events into
// bus publications on one dispatch task, so every reconciler and
// renderer downstream runs serialized. Connection failures are bus
// events, never `Err` returns.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use arc_swap::ArcSwapOption;
use strum::{Display, IntoStaticStr};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use yengou_api::realtime::{RealtimeHandle, ReconnectConfig, TransportEvent};
use yengou_api::wire::{InboundFrame, OutboundFrame};

use crate::bus::{BusEvent, ConnectionFault, DisconnectReason, EventBus};
use crate::config::Credential;
use crate::error::CoreError;
use crate::subscription::ControlSink;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The transport gave up; `connect()`/`reconnect()` starts over.
    Errored,
}

// ── ControlChannel ───────────────────────────────────────────────

/// Outbound path to whichever transport is current.
#[derive(Default)]
pub struct ControlChannel {
    sender: ArcSwapOption<mpsc::UnboundedSender<OutboundFrame>>,
}

impl ControlChannel {
    fn install(&self, sender: mpsc::UnboundedSender<OutboundFrame>) {
        self.sender.store(Some(Arc::new(sender)));
    }

    fn clear(&self) {
        self.sender.store(None);
    }

    /// Queue a frame on the live transport. `false` if there is none.
    pub fn send(&self, frame: OutboundFrame) -> bool {
        match self.sender.load().as_deref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }
}

impl ControlSink for ControlChannel {
    fn send_control(&self, frame: OutboundFrame) {
        let event = frame.event_name();
        if !self.send(frame) {
            debug!(event, "no live transport, control frame dropped");
        }
    }
}

// ── ConnectionManager ────────────────────────────────────────────

struct Session {
    credential: Credential,
    cancel: CancellationToken,
    transport: RealtimeHandle,
    dispatch: JoinHandle<()>,
}

impl Session {
    async fn teardown(self) {
        self.cancel.cancel();
        self.transport.shutdown().await;
        if let Err(e) = self.dispatch.await {
            warn!(error = %e, "dispatch task ended abnormally");
        }
    }
}

/// Lifecycle owner of the realtime connection.
///
/// Cheaply cloneable via `Arc<ConnectionInner>`.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    realtime_url: Url,
    reconnect: ReconnectConfig,
    bus: Arc<EventBus>,
    control: Arc<ControlChannel>,
    state: watch::Sender<ConnectionState>,
    session: Mutex<Option<Session>>,
    last_credential: StdMutex<Option<Credential>>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    pub fn new(
        realtime_url: Url,
        reconnect: ReconnectConfig,
        bus: Arc<EventBus>,
        control: Arc<ControlChannel>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ConnectionInner {
                realtime_url,
                reconnect,
                bus,
                control,
                state,
                session: Mutex::new(None),
                last_credential: StdMutex::new(None),
                cancel: CancellationToken::new(),
            }),
        }
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Start the realtime connection.
    ///
    /// A no-op while connecting or connected with the same credential. A
    /// different credential tears the current connection down and
    /// replaces it; active scopes are replayed on the new one. Failures
    /// arrive later as `ConnectionError` bus events.
    pub async fn connect(&self, credential: Credential) {
        let mut session = self.inner.session.lock().await;

        let state = *self.inner.state.borrow();
        if let Some(current) = session.as_ref() {
            let live = matches!(
                state,
                ConnectionState::Connecting | ConnectionState::Connected
            );
            if live && current.credential.same_as(&credential) {
                debug!(%state, "connect ignored, already live");
                return;
            }
        }

        let credential_changed = session
            .as_ref()
            .is_some_and(|s| !s.credential.same_as(&credential));
        if let Some(old) = session.take() {
            old.teardown().await;
            if credential_changed {
                info!("credential changed, recreating connection");
                self.inner
                    .bus
                    .publish(&BusEvent::Disconnected(DisconnectReason::CredentialChanged));
            }
        }

        *session = Some(self.start(credential));
    }

    /// Tear down and reconnect with the most recently supplied credential.
    pub async fn reconnect(&self) -> Result<(), CoreError> {
        let credential = self.last_credential().ok_or(CoreError::NoCredential)?;
        let mut session = self.inner.session.lock().await;
        if let Some(old) = session.take() {
            old.teardown().await;
            self.inner
                .bus
                .publish(&BusEvent::Disconnected(DisconnectReason::Transport(
                    "reconnect requested".into(),
                )));
        }
        *session = Some(self.start(credential));
        Ok(())
    }

    /// Tear down the connection and clear all subscription state.
    ///
    /// Scopes acquired while idle are cleared too, so this always
    /// publishes a client-requested disconnect.
    pub async fn disconnect(&self) {
        let mut session = self.inner.session.lock().await;
        match session.take() {
            Some(old) => {
                old.teardown().await;
                info!("disconnected");
            }
            None => debug!("no connection to tear down"),
        }

        self.inner.control.clear();
        self.inner.state.send_replace(ConnectionState::Disconnected);
        self.inner
            .bus
            .publish(&BusEvent::Disconnected(DisconnectReason::ClientRequested));
    }

    /// Stop everything for good. Used on process teardown.
    pub async fn shutdown(&self) {
        self.disconnect().await;
        self.inner.cancel.cancel();
    }

    // ── Data plane ───────────────────────────────────────────────

    /// Queue a non-control frame (e.g. `driver:location:send`).
    pub fn send(&self, frame: OutboundFrame) -> Result<(), CoreError> {
        if self.state() != ConnectionState::Connected {
            return Err(CoreError::NotConnected);
        }
        if self.inner.control.send(frame) {
            Ok(())
        } else {
            Err(CoreError::NotConnected)
        }
    }

    // ── Observers ────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn last_credential(&self) -> Option<Credential> {
        self.inner
            .last_credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── Internals ────────────────────────────────────────────────

    fn start(&self, credential: Credential) -> Session {
        *self
            .inner
            .last_credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());

        self.inner.state.send_replace(ConnectionState::Connecting);
        info!(url = %self.inner.realtime_url, "starting realtime connection");

        let cancel = self.inner.cancel.child_token();
        let (transport, events) = RealtimeHandle::spawn(
            self.inner.realtime_url.clone(),
            credential.secret().clone(),
            self.inner.reconnect.clone(),
            cancel.clone(),
        );
        self.inner.control.install(transport.sender());

        let dispatch = tokio::spawn(dispatch_task(
            Arc::clone(&self.inner),
            events,
            cancel.clone(),
        ));

        Session {
            credential,
            cancel,
            transport,
            dispatch,
        }
    }
}

// ── Dispatch task ────────────────────────────────────────────────

/// Transport events → state changes and bus publications.
async fn dispatch_task(
    inner: Arc<ConnectionInner>,
    mut events: mpsc::Receiver<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => event,
        };
        let Some(event) = event else { break };

        match event {
            TransportEvent::Connected => {
                inner.state.send_replace(ConnectionState::Connected);
                info!("realtime connected");
                inner.bus.publish(&BusEvent::Connected);
            }
            TransportEvent::Frame(frame) => {
                inner.bus.publish(&frame_to_event(frame));
            }
            TransportEvent::Disconnected { reason } => {
                inner.state.send_replace(ConnectionState::Connecting);
                warn!(%reason, "realtime connection lost");
                inner
                    .bus
                    .publish(&BusEvent::Disconnected(DisconnectReason::Transport(reason)));
            }
            TransportEvent::Failed { detail, will_retry } => {
                let next = if will_retry {
                    ConnectionState::Connecting
                } else {
                    ConnectionState::Errored
                };
                inner.state.send_replace(next);
                warn!(%detail, will_retry, "realtime connection failed");
                inner
                    .bus
                    .publish(&BusEvent::ConnectionError(ConnectionFault { detail, will_retry }));
            }
        }
    }
    debug!("dispatch task exiting");
}

fn frame_to_event(frame: InboundFrame) -> BusEvent {
    match frame {
        InboundFrame::DriverLocation(u) => BusEvent::DriverLocation(Arc::new(u)),
        InboundFrame::Trip(u) => BusEvent::TripUpdate(Arc::new(u)),
        InboundFrame::ServiceMatch(u) => BusEvent::ServiceMatch(Arc::new(u)),
        InboundFrame::Notification(n) => BusEvent::Notification(Arc::new(n)),
        InboundFrame::DashboardStats(s) => BusEvent::DashboardStats(Arc::new(s)),
        InboundFrame::Alert(a) => BusEvent::SystemAlert(Arc::new(a)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bus::Topic;
    use yengou_api::wire::TripUpdate;

    #[test]
    fn frames_map_to_topics() {
        let event = frame_to_event(InboundFrame::Trip(TripUpdate::new("T1")));
        assert_eq!(event.topic(), Topic::TripUpdate);
    }

    #[test]
    fn control_channel_without_transport_drops() {
        let channel = ControlChannel::default();
        assert!(!channel.send(OutboundFrame::SubscribeDashboard));

        let (tx, mut rx) = mpsc::unbounded_channel();
        channel.install(tx);
        channel.send_control(OutboundFrame::SubscribeDashboard);
        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::SubscribeDashboard);

        channel.clear();
        assert!(!channel.send(OutboundFrame::UnsubscribeDashboard));
    }

    #[tokio::test]
    async fn disconnect_when_idle_still_clears_subscriptions() {
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.channel(&[Topic::Disconnected]);
        let manager = ConnectionManager::new(
            Url::parse("ws://127.0.0.1:9/realtime").unwrap(),
            ReconnectConfig::default(),
            Arc::clone(&bus),
            Arc::new(ControlChannel::default()),
        );

        manager.disconnect().await;
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(matches!(
            rx.try_recv(),
            Some(BusEvent::Disconnected(DisconnectReason::ClientRequested))
        ));
    }

    #[tokio::test]
    async fn reconnect_without_credential_fails() {
        let manager = ConnectionManager::new(
            Url::parse("ws://127.0.0.1:9/realtime").unwrap(),
            ReconnectConfig::default(),
            Arc::new(EventBus::new()),
            Arc::new(ControlChannel::default()),
        );
        assert!(matches!(manager.reconnect().await, Err(CoreError::NoCredential)));
    }
}
