//! Data bridge: forwards [`Console`] streams to TUI actions.
//!
//! Seeds from REST, connects, then loops forwarding snapshot changes,
//! connection transitions, notifications, alerts and dashboard counters
//! until cancelled.

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use yengou_core::{Console, Credential, Scope};

use crate::action::{Action, Toast};

pub async fn spawn_data_bridge(
    console: Console,
    credential: Credential,
    action_tx: mpsc::UnboundedSender<Action>,
    cancel: CancellationToken,
) {
    match console.seed(&credential).await {
        Ok(report) => {
            let _ = action_tx.send(Action::Seeded(report));
        }
        Err(e) => {
            warn!(error = %e, "seeding failed");
            let _ = action_tx.send(Action::Notify(Toast::warning(format!("Seeding failed: {e}"))));
        }
    }

    // Held for the bridge's lifetime; released on exit.
    let _dashboard = console.acquire(Scope::Dashboard);

    let mut drivers = console.driver_stream();
    let mut trips = console.trip_stream();
    let mut state = console.connection_state();
    let mut notifications = console.notifications();
    let mut alerts = console.alerts();
    let mut dashboard = console.dashboard_stats();

    let _ = action_tx.send(Action::DriversUpdated(drivers.current().clone()));
    let _ = action_tx.send(Action::TripsUpdated(trips.current().clone()));

    console.connect(credential).await;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            Ok(()) = state.changed() => {
                let current = *state.borrow_and_update();
                let _ = action_tx.send(Action::ConnectionChanged(current));
            }
            Some(snapshot) = drivers.changed() => {
                let _ = action_tx.send(Action::DriversUpdated(snapshot));
            }
            Some(snapshot) = trips.changed() => {
                let _ = action_tx.send(Action::TripsUpdated(snapshot));
            }
            Ok(()) = dashboard.changed() => {
                let latest = dashboard.borrow_and_update().clone();
                if let Some(stats) = latest {
                    let _ = action_tx.send(Action::DashboardUpdated(stats));
                }
            }
            received = notifications.recv() => match received {
                Ok(n) => {
                    let _ = action_tx.send(Action::NotificationReceived(n));
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "notification bridge lagged"),
                Err(RecvError::Closed) => break,
            },
            received = alerts.recv() => match received {
                Ok(a) => {
                    let _ = action_tx.send(Action::AlertReceived(a));
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "alert bridge lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    console.shutdown().await;
    debug!("data bridge shut down");
}
