// ── Per-kind acceptance rules ──
//
// Driver locations: strictly newer timestamp wins, anything else is stale.
// Trips: shallow merge, incoming fields win.
// Service matches: last write wins.

use yengou_api::wire::{DriverLocationUpdate, ServiceMatchUpdate, TripUpdate};

use super::reconciler::{Acceptance, Reconcile};
use crate::model::{DriverLocation, ServiceMatch, Trip};

impl Reconcile for DriverLocation {
    type Update = DriverLocationUpdate;
    const KIND: &'static str = "driver";

    fn key(update: &Self::Update) -> &str {
        &update.driver_id
    }

    fn reconcile(current: Option<&Self>, update: Self::Update) -> Acceptance<Self> {
        match current {
            Some(existing) if update.timestamp <= existing.timestamp => Acceptance::Stale,
            _ => Acceptance::Accepted(update.into()),
        }
    }
}

impl Reconcile for Trip {
    type Update = TripUpdate;
    const KIND: &'static str = "trip";

    fn key(update: &Self::Update) -> &str {
        &update.trip_id
    }

    fn reconcile(current: Option<&Self>, update: Self::Update) -> Acceptance<Self> {
        Acceptance::Accepted(match current {
            Some(existing) => existing.merged(update),
            None => update.into(),
        })
    }
}

impl Reconcile for ServiceMatch {
    type Update = ServiceMatchUpdate;
    const KIND: &'static str = "service-match";

    fn key(update: &Self::Update) -> &str {
        &update.service_id
    }

    fn reconcile(_current: Option<&Self>, update: Self::Update) -> Acceptance<Self> {
        Acceptance::Accepted(update.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use yengou_api::wire::{DriverStatus, GeoPoint, MatchStatus, Place, TripStatus};

    use super::*;
    use crate::store::Reconciler;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_772_000_000 + secs, 0).unwrap()
    }

    fn location(id: &str, t: i64, lat: f64, lng: f64, status: DriverStatus) -> DriverLocationUpdate {
        DriverLocationUpdate {
            driver_id: id.into(),
            latitude: lat,
            longitude: lng,
            accuracy: 5.0,
            speed: 0.0,
            timestamp: at(t),
            status,
        }
    }

    #[test]
    fn driver_keeps_latest_and_drops_stale() {
        let drivers: Reconciler<DriverLocation> = Reconciler::new();

        assert!(drivers.apply(location("D1", 1, 14.69, -17.44, DriverStatus::Available)).is_some());
        assert!(drivers.apply(location("D1", 3, 14.70, -17.45, DriverStatus::Busy)).is_some());
        assert!(drivers.apply(location("D1", 2, 14.10, -17.10, DriverStatus::Offline)).is_none());

        let d1 = drivers.get("D1").unwrap();
        assert_eq!(d1.timestamp, at(3));
        assert_eq!(d1.position, GeoPoint::new(14.70, -17.45));
        assert_eq!(d1.status, DriverStatus::Busy);
        assert_eq!(drivers.stale_discards(), 1);
    }

    #[test]
    fn equal_timestamp_is_stale() {
        let drivers: Reconciler<DriverLocation> = Reconciler::new();
        drivers.apply(location("D1", 5, 1.0, 1.0, DriverStatus::Available));
        assert!(drivers.apply(location("D1", 5, 2.0, 2.0, DriverStatus::Busy)).is_none());
        assert_eq!(drivers.get("D1").unwrap().position, GeoPoint::new(1.0, 1.0));
    }

    #[test]
    fn increasing_sequence_ends_on_last_element() {
        let drivers: Reconciler<DriverLocation> = Reconciler::new();
        let updates: Vec<_> = (0..20)
            .map(|t| location("D7", t, f64::from(t as i32), 0.0, DriverStatus::Available))
            .collect();
        let last = DriverLocation::from(updates[19].clone());

        for u in updates {
            drivers.apply(u);
        }
        assert_eq!(*drivers.get("D7").unwrap(), last);
        assert_eq!(drivers.stale_discards(), 0);
    }

    #[test]
    fn trip_partial_updates_merge() {
        let trips: Reconciler<Trip> = Reconciler::new();

        trips.apply(TripUpdate::new("T1").with_status(TripStatus::Accepted));
        trips.apply(TripUpdate::new("T1").with_progress(40.0));

        let t1 = trips.get("T1").unwrap();
        assert_eq!(t1.status, Some(TripStatus::Accepted));
        assert_eq!(t1.progress, Some(40.0));
        assert!(t1.driver_location.is_none());
    }

    #[test]
    fn trip_field_takes_last_specifying_update() {
        let trips: Reconciler<Trip> = Reconciler::new();
        let place = |name: &str| Place {
            point: GeoPoint::new(14.7, -17.4),
            name: Some(name.into()),
        };

        let mut first = TripUpdate::new("T2").with_progress(10.0);
        first.departure = Some(place("Plateau"));
        trips.apply(first);
        trips.apply(TripUpdate::new("T2").with_progress(55.0));
        trips.apply(TripUpdate::new("T2").with_status(TripStatus::InTransit));

        let t2 = trips.get("T2").unwrap();
        assert_eq!(t2.progress, Some(55.0));
        assert_eq!(t2.status, Some(TripStatus::InTransit));
        assert_eq!(t2.departure, Some(place("Plateau")));
        assert_eq!(trips.stale_discards(), 0);
    }

    #[test]
    fn service_match_last_write_wins() {
        let matches: Reconciler<ServiceMatch> = Reconciler::new();
        matches.apply(ServiceMatchUpdate {
            service_id: "S1".into(),
            status: MatchStatus::Matching,
            driver_id: None,
            estimated_pickup_time: None,
        });
        matches.apply(ServiceMatchUpdate {
            service_id: "S1".into(),
            status: MatchStatus::Matched,
            driver_id: Some("D1".into()),
            estimated_pickup_time: None,
        });

        let s1 = matches.get("S1").unwrap();
        assert_eq!(s1.status, MatchStatus::Matched);
        assert_eq!(s1.driver_id.as_deref(), Some("D1"));
    }

    #[test]
    fn snapshot_and_change_feed_follow_accepted_updates() {
        let drivers: Reconciler<DriverLocation> = Reconciler::new();
        let mut changes = drivers.subscribe_changes();

        drivers.apply(location("D1", 1, 0.0, 0.0, DriverStatus::Available));
        drivers.apply(location("D2", 1, 0.0, 0.0, DriverStatus::Busy));
        drivers.apply(location("D1", 0, 0.0, 0.0, DriverStatus::Busy));

        let snap = drivers.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap["D1"].status, DriverStatus::Available);

        assert_eq!(changes.try_recv().unwrap().id, "D1");
        assert_eq!(changes.try_recv().unwrap().id, "D2");
        assert!(changes.try_recv().is_err(), "stale update must not emit a change");
    }

    #[test]
    fn seed_uses_the_same_rule() {
        let trips: Reconciler<Trip> = Reconciler::new();
        let accepted = trips.seed([
            TripUpdate::new("T1").with_status(TripStatus::Accepted),
            TripUpdate::new("T2").with_status(TripStatus::InTransit),
            TripUpdate::new("T1").with_progress(20.0),
        ]);

        assert_eq!(accepted, 3);
        assert_eq!(trips.len(), 2);
        let t1 = trips.get("T1").unwrap();
        assert_eq!(t1.status, Some(TripStatus::Accepted));
        assert_eq!(t1.progress, Some(20.0));
    }

    #[test]
    fn seed_over_live_record_keeps_fields_it_lacks() {
        let trips: Reconciler<Trip> = Reconciler::new();
        trips.apply(
            TripUpdate::new("T1")
                .with_status(TripStatus::InTransit)
                .with_progress(60.0),
        );

        // A REST row read before the trip started moving.
        trips.seed([TripUpdate::new("T1").with_status(TripStatus::Accepted)]);

        let t1 = trips.get("T1").unwrap();
        assert_eq!(t1.status, Some(TripStatus::Accepted));
        assert_eq!(t1.progress, Some(60.0));
    }
}
