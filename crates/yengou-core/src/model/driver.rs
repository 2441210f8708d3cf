// ── Driver location domain type ──

use chrono::{DateTime, Utc};
use serde::Serialize;
use yengou_api::wire::{DriverLocationUpdate, DriverStatus, GeoPoint};

/// Latest known position of one driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocation {
    pub driver_id: String,
    pub position: GeoPoint,
    pub accuracy: f64,
    pub speed: f64,
    pub timestamp: DateTime<Utc>,
    pub status: DriverStatus,
}

impl From<DriverLocationUpdate> for DriverLocation {
    fn from(u: DriverLocationUpdate) -> Self {
        Self {
            position: u.position(),
            driver_id: u.driver_id,
            accuracy: u.accuracy,
            speed: u.speed,
            timestamp: u.timestamp,
            status: u.status,
        }
    }
}
