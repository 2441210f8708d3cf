// ── Visibility predicates for the live map ──
//
// Decide which snapshot entries get markers without touching the
// reconcilers.

use std::collections::BTreeSet;

use yengou_api::wire::{DriverStatus, TripStatus};

use crate::model::{DriverLocation, Trip};

/// Filter predicate for driver markers.
pub enum DriverFilter {
    All,
    Statuses(BTreeSet<DriverStatus>),
    Custom(Box<dyn Fn(&DriverLocation) -> bool + Send + Sync>),
}

impl DriverFilter {
    pub fn matches(&self, driver: &DriverLocation) -> bool {
        match self {
            Self::All => true,
            Self::Statuses(set) => set.contains(&driver.status),
            Self::Custom(f) => f(driver),
        }
    }

    /// Toggle one status in a `Statuses` filter. `All` becomes the set of
    /// every status except the toggled one.
    pub fn toggle(&mut self, status: DriverStatus) {
        match self {
            Self::Statuses(set) => {
                if !set.remove(&status) {
                    set.insert(status);
                }
            }
            Self::All => {
                let mut set: BTreeSet<_> = [
                    DriverStatus::Available,
                    DriverStatus::Busy,
                    DriverStatus::Offline,
                ]
                .into_iter()
                .collect();
                set.remove(&status);
                *self = Self::Statuses(set);
            }
            Self::Custom(_) => {}
        }
    }

    pub fn shows(&self, status: DriverStatus) -> bool {
        match self {
            Self::All | Self::Custom(_) => true,
            Self::Statuses(set) => set.contains(&status),
        }
    }
}

impl Default for DriverFilter {
    /// Available and busy drivers; offline ones are hidden.
    fn default() -> Self {
        Self::Statuses([DriverStatus::Available, DriverStatus::Busy].into_iter().collect())
    }
}

/// Filter predicate for trip markers.
#[derive(Default)]
pub enum TripFilter {
    All,
    /// Pending, accepted or in transit (or status not yet known).
    #[default]
    Active,
    Hidden,
    ByStatus(TripStatus),
    Custom(Box<dyn Fn(&Trip) -> bool + Send + Sync>),
}

impl TripFilter {
    pub fn matches(&self, trip: &Trip) -> bool {
        match self {
            Self::All => true,
            Self::Active => trip.is_active(),
            Self::Hidden => false,
            Self::ByStatus(s) => trip.status == Some(*s),
            Self::Custom(f) => f(trip),
        }
    }
}

/// Both predicates the marker renderer needs.
#[derive(Default)]
pub struct MapFilter {
    pub drivers: DriverFilter,
    pub trips: TripFilter,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use yengou_api::wire::{GeoPoint, TripUpdate};

    fn driver(status: DriverStatus) -> DriverLocation {
        DriverLocation {
            driver_id: "D1".into(),
            position: GeoPoint::new(0.0, 0.0),
            accuracy: 0.0,
            speed: 0.0,
            timestamp: Utc::now(),
            status,
        }
    }

    #[test]
    fn default_hides_offline_drivers() {
        let f = MapFilter::default();
        assert!(f.drivers.matches(&driver(DriverStatus::Available)));
        assert!(f.drivers.matches(&driver(DriverStatus::Busy)));
        assert!(!f.drivers.matches(&driver(DriverStatus::Offline)));
    }

    #[test]
    fn default_shows_active_trips_only() {
        let f = MapFilter::default();
        let trip = |s| Trip::from(TripUpdate::new("T").with_status(s));
        assert!(f.trips.matches(&trip(TripStatus::Pending)));
        assert!(f.trips.matches(&trip(TripStatus::InTransit)));
        assert!(!f.trips.matches(&trip(TripStatus::Completed)));
        assert!(!f.trips.matches(&trip(TripStatus::Cancelled)));
    }

    #[test]
    fn toggle_flips_membership() {
        let mut f = DriverFilter::default();
        f.toggle(DriverStatus::Offline);
        assert!(f.shows(DriverStatus::Offline));
        f.toggle(DriverStatus::Busy);
        assert!(!f.shows(DriverStatus::Busy));

        let mut all = DriverFilter::All;
        all.toggle(DriverStatus::Available);
        assert!(!all.shows(DriverStatus::Available));
        assert!(all.shows(DriverStatus::Offline));
    }

    #[test]
    fn custom_predicate() {
        let f = DriverFilter::Custom(Box::new(|d| d.driver_id.starts_with('D')));
        assert!(f.matches(&driver(DriverStatus::Offline)));
    }
}
