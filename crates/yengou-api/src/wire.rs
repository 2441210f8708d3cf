//! Realtime wire protocol.
//!
//! Every frame on the socket is a JSON text message shaped
//! `{"event": "<name>", "data": {...}}`. Inbound and outbound frames are
//! closed, adjacently-tagged enums so an unknown event name is a parse
//! error rather than a silently mistyped payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

// ── Status enums ─────────────────────────────────────────────────────

/// Availability of a driver as reported with each location update.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum DriverStatus {
    Available,
    Busy,
    Offline,
}

/// Lifecycle of a trip.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TripStatus {
    Pending,
    Accepted,
    InTransit,
    Completed,
    Cancelled,
}

impl TripStatus {
    /// Trips that still belong on a live view.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Accepted | Self::InTransit)
    }
}

/// Outcome of matching a service request to a driver.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Matching,
    Matched,
    Failed,
}

/// Severity class of a pushed notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
    Success,
}

/// Class of a system alert raised by the backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    Info,
    Warning,
    Error,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

// ── Geometry ─────────────────────────────────────────────────────────

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A named point: a trip's pickup or drop-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    #[serde(flatten)]
    pub point: GeoPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ── Inbound payloads ─────────────────────────────────────────────────

/// `driver:location:update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocationUpdate {
    pub driver_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub speed: f64,
    pub timestamp: DateTime<Utc>,
    pub status: DriverStatus,
}

impl DriverLocationUpdate {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// `trip:update`
///
/// Every field except the id is optional: the backend pushes partial
/// updates that are merged onto the last known record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripUpdate {
    pub trip_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TripStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_arrival: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure: Option<Place>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival: Option<Place>,
}

impl TripUpdate {
    /// An update carrying only the trip id.
    pub fn new(trip_id: impl Into<String>) -> Self {
        Self {
            trip_id: trip_id.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: TripStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// `service:match:update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMatchUpdate {
    pub service_id: String,
    pub status: MatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_pickup_time: Option<DateTime<Utc>>,
}

/// `system:notification`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemNotification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_role: Option<Vec<String>>,
}

/// `dashboard:stats:update`
///
/// Known counters are typed; anything else the backend adds lands in
/// `extra` so nothing is silently dropped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(default)]
    pub total_drivers: u64,
    #[serde(default)]
    pub total_clients: u64,
    #[serde(default)]
    pub total_services: u64,
    #[serde(default)]
    pub services_today: u64,
    #[serde(default)]
    pub revenue_today: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `system:alert`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemAlert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<AlertSeverity>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Outbound payloads ────────────────────────────────────────────────

/// Body of `driver:location:send`, published by driver clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationReport {
    pub driver_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub speed: f64,
    pub timestamp: DateTime<Utc>,
}

// ── Frames ───────────────────────────────────────────────────────────

/// Every event the server pushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum InboundFrame {
    #[serde(rename = "driver:location:update")]
    DriverLocation(DriverLocationUpdate),
    #[serde(rename = "trip:update")]
    Trip(TripUpdate),
    #[serde(rename = "service:match:update")]
    ServiceMatch(ServiceMatchUpdate),
    #[serde(rename = "system:notification")]
    Notification(SystemNotification),
    #[serde(rename = "dashboard:stats:update")]
    DashboardStats(DashboardStats),
    #[serde(rename = "system:alert")]
    Alert(SystemAlert),
}

impl InboundFrame {
    /// Parse a single text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire name of the event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::DriverLocation(_) => "driver:location:update",
            Self::Trip(_) => "trip:update",
            Self::ServiceMatch(_) => "service:match:update",
            Self::Notification(_) => "system:notification",
            Self::DashboardStats(_) => "dashboard:stats:update",
            Self::Alert(_) => "system:alert",
        }
    }
}

/// Every frame the client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundFrame {
    #[serde(rename = "subscribe:driver")]
    SubscribeDriver {
        #[serde(rename = "driverId")]
        driver_id: String,
    },
    #[serde(rename = "unsubscribe:driver")]
    UnsubscribeDriver {
        #[serde(rename = "driverId")]
        driver_id: String,
    },
    #[serde(rename = "subscribe:trip")]
    SubscribeTrip {
        #[serde(rename = "tripId")]
        trip_id: String,
    },
    #[serde(rename = "unsubscribe:trip")]
    UnsubscribeTrip {
        #[serde(rename = "tripId")]
        trip_id: String,
    },
    #[serde(rename = "subscribe:dashboard")]
    SubscribeDashboard,
    #[serde(rename = "unsubscribe:dashboard")]
    UnsubscribeDashboard,
    #[serde(rename = "driver:location:send")]
    SendLocation(LocationReport),
}

impl OutboundFrame {
    /// Serialize to the JSON text sent on the socket.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name of the event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::SubscribeDriver { .. } => "subscribe:driver",
            Self::UnsubscribeDriver { .. } => "unsubscribe:driver",
            Self::SubscribeTrip { .. } => "subscribe:trip",
            Self::UnsubscribeTrip { .. } => "unsubscribe:trip",
            Self::SubscribeDashboard => "subscribe:dashboard",
            Self::UnsubscribeDashboard => "unsubscribe:dashboard",
            Self::SendLocation(_) => "driver:location:send",
        }
    }

    /// Whether this frame scopes or unscopes a stream.
    pub fn is_control(&self) -> bool {
        !matches!(self, Self::SendLocation(_))
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parse_driver_location_frame() {
        let raw = json!({
            "event": "driver:location:update",
            "data": {
                "driverId": "D1",
                "latitude": 14.69,
                "longitude": -17.44,
                "accuracy": 5.0,
                "speed": 12.5,
                "timestamp": "2026-03-01T10:00:00.000Z",
                "status": "AVAILABLE"
            }
        });

        let frame = InboundFrame::parse(&raw.to_string()).unwrap();
        let InboundFrame::DriverLocation(update) = frame else {
            panic!("expected a driver location frame");
        };
        assert_eq!(update.driver_id, "D1");
        assert_eq!(update.status, DriverStatus::Available);
        assert_eq!(update.position(), GeoPoint::new(14.69, -17.44));
    }

    #[test]
    fn parse_partial_trip_frame() {
        let raw = json!({
            "event": "trip:update",
            "data": { "tripId": "T1", "progress": 40 }
        });

        let InboundFrame::Trip(update) = InboundFrame::parse(&raw.to_string()).unwrap() else {
            panic!("expected a trip frame");
        };
        assert_eq!(update.trip_id, "T1");
        assert_eq!(update.status, None);
        assert_eq!(update.progress, Some(40.0));
        assert!(update.driver_location.is_none());
    }

    #[test]
    fn parse_notification_with_audience() {
        let raw = json!({
            "event": "system:notification",
            "data": {
                "type": "WARNING",
                "title": "Surge",
                "message": "High demand in Plateau",
                "timestamp": "2026-03-01T10:00:00Z",
                "targetRole": ["ROLE_ADMIN"]
            }
        });

        let InboundFrame::Notification(n) = InboundFrame::parse(&raw.to_string()).unwrap() else {
            panic!("expected a notification frame");
        };
        assert_eq!(n.kind, NotificationKind::Warning);
        assert_eq!(n.target_role.as_deref(), Some(&["ROLE_ADMIN".to_string()][..]));
        assert!(n.user_id.is_none());
    }

    #[test]
    fn dashboard_stats_keep_unknown_fields() {
        let raw = json!({
            "event": "dashboard:stats:update",
            "data": { "totalDrivers": 42, "activeTrips": 7 }
        });

        let InboundFrame::DashboardStats(stats) = InboundFrame::parse(&raw.to_string()).unwrap()
        else {
            panic!("expected a stats frame");
        };
        assert_eq!(stats.total_drivers, 42);
        assert_eq!(stats.extra["activeTrips"], 7);
    }

    #[test]
    fn unknown_event_is_rejected() {
        let raw = json!({ "event": "chat:message", "data": {} });
        assert!(InboundFrame::parse(&raw.to_string()).is_err());
    }

    #[test]
    fn outbound_control_frames_match_wire_shape() {
        let frame = OutboundFrame::SubscribeDriver {
            driver_id: "D2".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "event": "subscribe:driver", "data": { "driverId": "D2" } })
        );

        let value: serde_json::Value =
            serde_json::from_str(&OutboundFrame::UnsubscribeDashboard.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({ "event": "unsubscribe:dashboard" }));
        assert!(OutboundFrame::UnsubscribeDashboard.is_control());
    }

    #[test]
    fn trip_status_activity() {
        assert!(TripStatus::InTransit.is_active());
        assert!(TripStatus::Pending.is_active());
        assert!(!TripStatus::Completed.is_active());
        assert!(!TripStatus::Cancelled.is_active());
        assert_eq!(TripStatus::InTransit.to_string(), "IN_TRANSIT");
        assert_eq!("busy".parse::<DriverStatus>().unwrap(), DriverStatus::Busy);
    }
}
