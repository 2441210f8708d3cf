// yengou-core: Realtime sync layer between yengou-api and consumers (CLI/TUI).

pub mod bus;
pub mod config;
pub mod connection;
pub mod console;
pub mod convert;
pub mod error;
pub mod model;
pub mod render;
pub mod store;
pub mod stream;
pub mod subscription;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bus::{BusEvent, BusReceiver, ConnectionFault, DisconnectReason, EventBus, Topic};
pub use config::{Audience, ConsoleConfig, Credential};
pub use connection::{ConnectionManager, ConnectionState};
pub use console::{Console, SeedReport};
pub use error::CoreError;
pub use render::{
    DriverFilter, MapFilter, MapSurface, MarkerId, MarkerKind, MarkerRenderer, MarkerSpec,
    RenderOutcome, TripFilter,
};
pub use store::{Reconciler, Snapshot};
pub use stream::SnapshotStream;
pub use subscription::{Scope, ScopeHandle, SubscriptionCoordinator};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Live records
    DriverLocation, ServiceMatch, Trip,
    // Directory
    DriverDirectory, DriverProfile,
    // Shared value types
    DashboardStats, DriverStatus, GeoPoint, Place, SystemAlert, SystemNotification, TripStatus,
};
