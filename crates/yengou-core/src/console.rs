// ── Console facade ──
//
// Wires the bus, subscription coordinator, connection manager and
// reconcilers for one operations console. No globals: every instance is
// independent, which is what tests and multi-profile tooling rely on.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use yengou_api::rest::RestClient;
use yengou_api::transport::TransportConfig;
use yengou_api::wire::{
    DashboardStats, LocationReport, OutboundFrame, SystemAlert, SystemNotification, TripUpdate,
};

use crate::bus::{BusEvent, EventBus, SubscriptionToken, Topic};
use crate::config::{ConsoleConfig, Credential};
use crate::connection::{ConnectionManager, ConnectionState, ControlChannel};
use crate::error::CoreError;
use crate::model::{DriverDirectory, DriverLocation, DriverProfile, ServiceMatch, Trip};
use crate::store::{Reconciler, Snapshot};
use crate::stream::SnapshotStream;
use crate::subscription::{Scope, ScopeHandle, SubscriptionCoordinator};

const NOTIFICATION_CHANNEL_SIZE: usize = 256;
const ALERT_CHANNEL_SIZE: usize = 256;

/// Counts returned by [`Console::seed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub drivers: usize,
    pub trips: usize,
}

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ConsoleInner>`.
#[derive(Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

struct ConsoleInner {
    config: ConsoleConfig,
    bus: Arc<EventBus>,
    coordinator: Arc<SubscriptionCoordinator>,
    connection: ConnectionManager,
    drivers: Arc<Reconciler<DriverLocation>>,
    trips: Arc<Reconciler<Trip>>,
    matches: Arc<Reconciler<ServiceMatch>>,
    directory: Arc<DriverDirectory>,
    dashboard: watch::Sender<Option<Arc<DashboardStats>>>,
    notification_tx: broadcast::Sender<Arc<SystemNotification>>,
    alert_tx: broadcast::Sender<Arc<SystemAlert>>,
    handlers: Vec<SubscriptionToken>,
}

impl Drop for ConsoleInner {
    fn drop(&mut self) {
        for token in self.handlers.drain(..) {
            self.bus.unsubscribe(token);
        }
    }
}

impl Console {
    /// Build a console. Does NOT connect: call [`connect()`](Self::connect).
    pub fn new(config: ConsoleConfig) -> Self {
        let bus = Arc::new(EventBus::new());
        let control = Arc::new(ControlChannel::default());
        let coordinator = SubscriptionCoordinator::new(Arc::clone(&control) as _);
        let connection = ConnectionManager::new(
            config.realtime_url.clone(),
            config.reconnect.clone(),
            Arc::clone(&bus),
            control,
        );

        let drivers = Arc::new(Reconciler::new());
        let trips = Arc::new(Reconciler::new());
        let matches = Arc::new(Reconciler::new());
        let (dashboard, _) = watch::channel(None);
        let (notification_tx, _) = broadcast::channel(NOTIFICATION_CHANNEL_SIZE);
        let (alert_tx, _) = broadcast::channel(ALERT_CHANNEL_SIZE);

        // Coordinator first: scope replay must precede anything a
        // `Connected` handler might trigger.
        let mut handlers = coordinator.attach(&bus);
        handlers.extend(wire_reconcilers(&bus, &drivers, &trips, &matches));
        handlers.extend(wire_fanout(
            &bus,
            &config,
            &dashboard,
            &notification_tx,
            &alert_tx,
        ));

        Self {
            inner: Arc::new(ConsoleInner {
                config,
                bus,
                coordinator,
                connection,
                drivers,
                trips,
                matches,
                directory: Arc::new(DriverDirectory::new()),
                dashboard,
                notification_tx,
                alert_tx,
                handlers,
            }),
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Open (or replace) the realtime connection. Failures arrive as
    /// `ConnectionError` bus events and as [`ConnectionState::Errored`].
    pub async fn connect(&self, credential: Credential) {
        self.inner.connection.connect(credential).await;
    }

    /// Restart with the last credential passed to [`connect()`](Self::connect).
    pub async fn reconnect(&self) -> Result<(), CoreError> {
        self.inner.connection.reconnect().await
    }

    /// Close the connection and forget every subscription scope.
    pub async fn disconnect(&self) {
        self.inner.connection.disconnect().await;
    }

    /// Disconnect and cancel every background task for good.
    pub async fn shutdown(&self) {
        self.inner.connection.shutdown().await;
    }

    // ── Seeding ──────────────────────────────────────────────────

    /// A REST client carrying `credential`.
    pub fn rest_client(&self, credential: &Credential) -> Result<RestClient, CoreError> {
        let transport = TransportConfig::with_timeout(self.inner.config.timeout);
        let client = RestClient::new(self.inner.config.api_url.clone(), &transport)?
            .with_token(credential.secret().clone());
        Ok(client)
    }

    /// Load the driver directory and active trips over REST.
    ///
    /// Trips go through the same shallow merge as pushed updates. Fields
    /// the REST payload carries (status, driver, places, ETA) overwrite
    /// the live record; fields it lacks, such as progress and driver
    /// position, are kept.
    pub async fn seed(&self, credential: &Credential) -> Result<SeedReport, CoreError> {
        let client = self.rest_client(credential)?;
        let (drivers, trips) = tokio::join!(client.list_drivers(), client.active_trips());

        let profiles = drivers?.into_iter().map(DriverProfile::from);
        let drivers = self.inner.directory.extend(profiles);
        let trips = self
            .inner
            .trips
            .seed(trips?.into_iter().map(TripUpdate::from));

        match client.dashboard_stats().await {
            Ok(stats) => {
                self.inner.dashboard.send_replace(Some(Arc::new(stats)));
            }
            Err(e) => debug!(error = %e, "dashboard stats unavailable"),
        }

        info!(drivers, trips, "seeded from REST");
        Ok(SeedReport { drivers, trips })
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Register interest in `scope`. Dropping the handle releases it.
    pub fn acquire(&self, scope: Scope) -> ScopeHandle {
        self.inner.coordinator.acquire(scope)
    }

    // ── Outbound data ────────────────────────────────────────────

    /// Publish this client's position as driver `driver_id`.
    pub fn send_location(
        &self,
        driver_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        accuracy: f64,
        speed: f64,
    ) -> Result<(), CoreError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoreError::ValidationFailed {
                message: format!("coordinates out of range: {latitude}, {longitude}"),
            });
        }
        let report = LocationReport {
            driver_id: driver_id.into(),
            latitude,
            longitude,
            accuracy,
            speed,
            timestamp: Utc::now(),
        };
        self.inner
            .connection
            .send(OutboundFrame::SendLocation(report))
    }

    // ── State observation ────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.watch_state()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn notifications(&self) -> broadcast::Receiver<Arc<SystemNotification>> {
        self.inner.notification_tx.subscribe()
    }

    pub fn alerts(&self) -> broadcast::Receiver<Arc<SystemAlert>> {
        self.inner.alert_tx.subscribe()
    }

    /// Latest `dashboard:stats:update`, if any has arrived.
    pub fn dashboard_stats(&self) -> watch::Receiver<Option<Arc<DashboardStats>>> {
        self.inner.dashboard.subscribe()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    pub fn coordinator(&self) -> &Arc<SubscriptionCoordinator> {
        &self.inner.coordinator
    }

    pub fn directory(&self) -> &Arc<DriverDirectory> {
        &self.inner.directory
    }

    // ── Reconcilers ──────────────────────────────────────────────

    pub fn drivers(&self) -> &Arc<Reconciler<DriverLocation>> {
        &self.inner.drivers
    }

    pub fn trips(&self) -> &Arc<Reconciler<Trip>> {
        &self.inner.trips
    }

    pub fn service_matches(&self) -> &Arc<Reconciler<ServiceMatch>> {
        &self.inner.matches
    }

    pub fn drivers_snapshot(&self) -> Snapshot<DriverLocation> {
        self.inner.drivers.snapshot()
    }

    pub fn trips_snapshot(&self) -> Snapshot<Trip> {
        self.inner.trips.snapshot()
    }

    pub fn driver_stream(&self) -> SnapshotStream<DriverLocation> {
        self.inner.drivers.stream()
    }

    pub fn trip_stream(&self) -> SnapshotStream<Trip> {
        self.inner.trips.stream()
    }
}

// ── Bus wiring ───────────────────────────────────────────────────

fn wire_reconcilers(
    bus: &EventBus,
    drivers: &Arc<Reconciler<DriverLocation>>,
    trips: &Arc<Reconciler<Trip>>,
    matches: &Arc<Reconciler<ServiceMatch>>,
) -> Vec<SubscriptionToken> {
    let d = Arc::clone(drivers);
    let on_location = bus.subscribe(Topic::DriverLocation, move |event| {
        if let BusEvent::DriverLocation(update) = event {
            d.apply(update.as_ref().clone());
        }
    });

    let t = Arc::clone(trips);
    let on_trip = bus.subscribe(Topic::TripUpdate, move |event| {
        if let BusEvent::TripUpdate(update) = event {
            t.apply(update.as_ref().clone());
        }
    });

    let m = Arc::clone(matches);
    let on_match = bus.subscribe(Topic::ServiceMatch, move |event| {
        if let BusEvent::ServiceMatch(update) = event {
            m.apply(update.as_ref().clone());
        }
    });

    vec![on_location, on_trip, on_match]
}

fn wire_fanout(
    bus: &EventBus,
    config: &ConsoleConfig,
    dashboard: &watch::Sender<Option<Arc<DashboardStats>>>,
    notification_tx: &broadcast::Sender<Arc<SystemNotification>>,
    alert_tx: &broadcast::Sender<Arc<SystemAlert>>,
) -> Vec<SubscriptionToken> {
    let audience = config.audience.clone();
    let tx = notification_tx.clone();
    let on_notification = bus.subscribe(Topic::Notification, move |event| {
        let BusEvent::Notification(n) = event else { return };
        if audience.accepts(n) {
            let _ = tx.send(Arc::clone(n));
        } else {
            debug!(title = %n.title, "notification not addressed to this console");
        }
    });

    let cell = dashboard.clone();
    let on_stats = bus.subscribe(Topic::DashboardStats, move |event| {
        if let BusEvent::DashboardStats(stats) = event {
            cell.send_replace(Some(Arc::clone(stats)));
        }
    });

    let tx = alert_tx.clone();
    let on_alert = bus.subscribe(Topic::SystemAlert, move |event| {
        if let BusEvent::SystemAlert(alert) = event {
            if tx.send(Arc::clone(alert)).is_err() {
                warn!(message = %alert.message, "system alert with no listener");
            }
        }
    });

    vec![on_notification, on_stats, on_alert]
}
