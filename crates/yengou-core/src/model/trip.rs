// ── Trip domain type ──

use chrono::{DateTime, Utc};
use serde::Serialize;
use yengou_api::wire::{GeoPoint, Place, TripStatus, TripUpdate};

/// Merged view of a trip.
///
/// Built up from partial `trip:update` payloads and REST seeding. A field
/// stays `None` until some update has specified it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub status: Option<TripStatus>,
    pub driver_id: Option<String>,
    pub driver_location: Option<GeoPoint>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub progress: Option<f64>,
    pub departure: Option<Place>,
    pub arrival: Option<Place>,
}

impl Trip {
    /// Shallow merge: fields present in `update` win, absent ones keep
    /// their current value.
    pub fn merged(&self, update: TripUpdate) -> Self {
        Self {
            id: self.id.clone(),
            status: update.status.or(self.status),
            driver_id: update.driver_id.or_else(|| self.driver_id.clone()),
            driver_location: update.driver_location.or(self.driver_location),
            estimated_arrival: update.estimated_arrival.or(self.estimated_arrival),
            progress: update.progress.or(self.progress),
            departure: update.departure.or_else(|| self.departure.clone()),
            arrival: update.arrival.or_else(|| self.arrival.clone()),
        }
    }

    /// Whether the trip still belongs on a live view. A trip whose status
    /// has never been reported counts as live.
    pub fn is_active(&self) -> bool {
        self.status.is_none_or(TripStatus::is_active)
    }
}

impl From<TripUpdate> for Trip {
    fn from(u: TripUpdate) -> Self {
        Self {
            id: u.trip_id,
            status: u.status,
            driver_id: u.driver_id,
            driver_location: u.driver_location,
            estimated_arrival: u.estimated_arrival,
            progress: u.progress,
            departure: u.departure,
            arrival: u.arrival,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn merge_keeps_unspecified_fields() {
        let trip = Trip::from(TripUpdate::new("T1").with_status(TripStatus::Accepted));
        let merged = trip.merged(TripUpdate::new("T1").with_progress(40.0));

        assert_eq!(merged.status, Some(TripStatus::Accepted));
        assert_eq!(merged.progress, Some(40.0));
        assert_eq!(merged.id, "T1");
    }

    #[test]
    fn merge_overwrites_specified_fields() {
        let trip = Trip::from(
            TripUpdate::new("T1")
                .with_status(TripStatus::Accepted)
                .with_progress(10.0),
        );
        let merged = trip.merged(TripUpdate::new("T1").with_status(TripStatus::InTransit));

        assert_eq!(merged.status, Some(TripStatus::InTransit));
        assert_eq!(merged.progress, Some(10.0));
    }

    #[test]
    fn unknown_status_counts_as_active() {
        assert!(Trip::from(TripUpdate::new("T9")).is_active());
        assert!(!Trip::from(TripUpdate::new("T9").with_status(TripStatus::Completed)).is_active());
    }
}
