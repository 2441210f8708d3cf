// ── Service match domain type ──

use chrono::{DateTime, Utc};
use serde::Serialize;
use yengou_api::wire::{MatchStatus, ServiceMatchUpdate};

/// Matching progress of one service request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMatch {
    pub service_id: String,
    pub status: MatchStatus,
    pub driver_id: Option<String>,
    pub estimated_pickup_time: Option<DateTime<Utc>>,
}

impl From<ServiceMatchUpdate> for ServiceMatch {
    fn from(u: ServiceMatchUpdate) -> Self {
        Self {
            service_id: u.service_id,
            status: u.status,
            driver_id: u.driver_id,
            estimated_pickup_time: u.estimated_pickup_time,
        }
    }
}
