// ── Domain model ──
//
// Canonical records held by the reconcilers and read by CLI/TUI
// consumers. Wire payloads are converted into these at the reconciler
// boundary.

pub mod directory;
pub mod driver;
pub mod service;
pub mod trip;

// ── Re-exports ──────────────────────────────────────────────────────

pub use directory::{DriverDirectory, DriverProfile};
pub use driver::DriverLocation;
pub use service::ServiceMatch;
pub use trip::Trip;

// Wire enums and value types are shared with the domain unchanged.
pub use yengou_api::wire::{
    AlertKind, AlertSeverity, DashboardStats, DriverStatus, GeoPoint, MatchStatus,
    NotificationKind, Place, SystemAlert, SystemNotification, TripStatus,
};
