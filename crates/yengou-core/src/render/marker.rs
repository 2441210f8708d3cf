//! Marker reconciliation for the live map.
//!
//! Given driver and trip snapshots, a [`MapFilter`], and a [`MapSurface`],
//! keeps exactly one marker per visible entity at its latest position.
//! Markers that persist between passes are moved in place; the surface
//! never sees a destroy-then-create for the same id.
//!
//! If the surface is not ready yet, the last desired marker set is held
//! and applied in one pass once [`MarkerRenderer::surface_ready`] is
//! called. Intermediate states are never replayed.

use std::collections::BTreeMap;
use std::fmt;

use yengou_api::wire::{DriverStatus, GeoPoint};

use super::filter::MapFilter;
use super::set::{ReconcileStats, RenderTarget, SetReconciler};
use crate::model::{DriverDirectory, DriverLocation, Trip};
use crate::store::Snapshot;

// ── Colours ──────────────────────────────────────────────────────────

/// 24-bit colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Fixed marker palette.
pub struct Palette;

impl Palette {
    pub const AVAILABLE: Rgb = Rgb(0x10, 0xB9, 0x81);
    pub const BUSY: Rgb = Rgb(0xF5, 0x9E, 0x0B);
    pub const OFFLINE: Rgb = Rgb(0x6B, 0x72, 0x80);
    pub const DEPARTURE: Rgb = Rgb(0x10, 0xB9, 0x81);
    pub const ARRIVAL: Rgb = Rgb(0xEF, 0x44, 0x44);

    pub fn driver(status: DriverStatus) -> Rgb {
        match status {
            DriverStatus::Available => Self::AVAILABLE,
            DriverStatus::Busy => Self::BUSY,
            DriverStatus::Offline => Self::OFFLINE,
        }
    }
}

// ── Marker identity and appearance ───────────────────────────────────

/// Composite marker key. Trips contribute a departure/arrival pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkerId {
    Driver(String),
    TripDeparture(String),
    TripArrival(String),
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver(id) => write!(f, "driver-{id}"),
            Self::TripDeparture(id) => write!(f, "trip-departure-{id}"),
            Self::TripArrival(id) => write!(f, "trip-arrival-{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Driver(DriverStatus),
    Departure,
    Arrival,
}

/// Everything a surface needs to draw one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub position: GeoPoint,
    pub kind: MarkerKind,
    pub color: Rgb,
    pub label: String,
}

// ── Surface ──────────────────────────────────────────────────────────

/// A map that can hold markers.
pub trait MapSurface {
    /// The surface's own handle for a placed marker.
    type Marker;

    /// `false` until the surface can accept marker operations.
    fn is_ready(&self) -> bool;

    fn create_marker(&mut self, id: &MarkerId, spec: &MarkerSpec) -> Self::Marker;
    fn update_marker(&mut self, id: &MarkerId, marker: &mut Self::Marker, spec: &MarkerSpec);
    fn remove_marker(&mut self, id: &MarkerId, marker: Self::Marker);

    /// Coordinate to pixel/cell position, `None` if off-surface.
    fn project(&self, point: GeoPoint) -> Option<(f64, f64)>;
}

struct SurfaceTarget<'a, S>(&'a mut S);

impl<S: MapSurface> RenderTarget<MarkerId, MarkerSpec> for SurfaceTarget<'_, S> {
    type Handle = S::Marker;

    fn create(&mut self, key: &MarkerId, value: &MarkerSpec) -> S::Marker {
        self.0.create_marker(key, value)
    }

    fn update(&mut self, key: &MarkerId, handle: &mut S::Marker, value: &MarkerSpec) {
        self.0.update_marker(key, handle, value);
    }

    fn destroy(&mut self, key: &MarkerId, handle: S::Marker) {
        self.0.remove_marker(key, handle);
    }
}

// ── Desired state ────────────────────────────────────────────────────

/// The marker set the snapshots and filter call for.
pub fn desired_markers(
    drivers: &Snapshot<DriverLocation>,
    trips: &Snapshot<Trip>,
    filter: &MapFilter,
    directory: &DriverDirectory,
) -> BTreeMap<MarkerId, MarkerSpec> {
    let mut desired = BTreeMap::new();

    for driver in drivers.values().filter(|d| filter.drivers.matches(d)) {
        desired.insert(
            MarkerId::Driver(driver.driver_id.clone()),
            MarkerSpec {
                position: driver.position,
                kind: MarkerKind::Driver(driver.status),
                color: Palette::driver(driver.status),
                label: directory.label(&driver.driver_id),
            },
        );
    }

    for trip in trips.values().filter(|t| filter.trips.matches(t)) {
        if let Some(place) = &trip.departure {
            desired.insert(
                MarkerId::TripDeparture(trip.id.clone()),
                MarkerSpec {
                    position: place.point,
                    kind: MarkerKind::Departure,
                    color: Palette::DEPARTURE,
                    label: place
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("Pickup {}", trip.id)),
                },
            );
        }
        if let Some(place) = &trip.arrival {
            desired.insert(
                MarkerId::TripArrival(trip.id.clone()),
                MarkerSpec {
                    position: place.point,
                    kind: MarkerKind::Arrival,
                    color: Palette::ARRIVAL,
                    label: place
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("Drop-off {}", trip.id)),
                },
            );
        }
    }

    desired
}

// ── Renderer ─────────────────────────────────────────────────────────

/// Result of a render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Applied(ReconcileStats),
    /// Surface not ready; held until [`MarkerRenderer::surface_ready`].
    Buffered,
}

/// Owns a surface and every marker on it.
pub struct MarkerRenderer<S: MapSurface> {
    surface: S,
    markers: SetReconciler<MarkerId, S::Marker>,
    pending: Option<BTreeMap<MarkerId, MarkerSpec>>,
}

impl<S: MapSurface> MarkerRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            markers: SetReconciler::new(),
            pending: None,
        }
    }

    /// Recompute desired markers and converge the surface onto them.
    pub fn render(
        &mut self,
        drivers: &Snapshot<DriverLocation>,
        trips: &Snapshot<Trip>,
        filter: &MapFilter,
        directory: &DriverDirectory,
    ) -> RenderOutcome {
        self.apply(desired_markers(drivers, trips, filter, directory))
    }

    /// Converge onto an already computed marker set.
    pub fn apply(&mut self, desired: BTreeMap<MarkerId, MarkerSpec>) -> RenderOutcome {
        if !self.surface.is_ready() {
            tracing::debug!(markers = desired.len(), "map surface not ready, buffering");
            self.pending = Some(desired);
            return RenderOutcome::Buffered;
        }
        self.pending = None;
        let stats = self
            .markers
            .reconcile(&desired, &mut SurfaceTarget(&mut self.surface));
        tracing::trace!(?stats, "markers reconciled");
        RenderOutcome::Applied(stats)
    }

    /// Apply the buffered marker set, if any, now that the surface can
    /// take it.
    pub fn surface_ready(&mut self) -> Option<ReconcileStats> {
        let pending = self.pending.take()?;
        match self.apply(pending) {
            RenderOutcome::Applied(stats) => Some(stats),
            RenderOutcome::Buffered => None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn rendered_ids(&self) -> Vec<MarkerId> {
        self.markers.keys().cloned().collect()
    }

    pub fn marker(&self, id: &MarkerId) -> Option<&S::Marker> {
        self.markers.get(id)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use yengou_api::wire::{Place, TripStatus};

    use super::*;
    use crate::render::{DriverFilter, TripFilter};

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Create(String),
        Update(String),
        Remove(String),
    }

    /// Records every operation; markers are serial numbers.
    #[derive(Default)]
    struct FakeSurface {
        ready: bool,
        serial: u32,
        ops: Vec<Op>,
        positions: HashMap<String, GeoPoint>,
    }

    impl MapSurface for FakeSurface {
        type Marker = u32;

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn create_marker(&mut self, id: &MarkerId, spec: &MarkerSpec) -> u32 {
            self.serial += 1;
            self.ops.push(Op::Create(id.to_string()));
            self.positions.insert(id.to_string(), spec.position);
            self.serial
        }

        fn update_marker(&mut self, id: &MarkerId, _marker: &mut u32, spec: &MarkerSpec) {
            self.ops.push(Op::Update(id.to_string()));
            self.positions.insert(id.to_string(), spec.position);
        }

        fn remove_marker(&mut self, id: &MarkerId, _marker: u32) {
            self.ops.push(Op::Remove(id.to_string()));
            self.positions.remove(&id.to_string());
        }

        fn project(&self, point: GeoPoint) -> Option<(f64, f64)> {
            Some((point.longitude, point.latitude))
        }
    }

    fn driver(id: &str, t: i64, lat: f64, status: DriverStatus) -> Arc<DriverLocation> {
        Arc::new(DriverLocation {
            driver_id: id.into(),
            position: GeoPoint::new(lat, -17.44),
            accuracy: 5.0,
            speed: 0.0,
            timestamp: Utc.timestamp_opt(1_772_000_000 + t, 0).unwrap(),
            status,
        })
    }

    fn drivers(list: &[Arc<DriverLocation>]) -> Snapshot<DriverLocation> {
        Arc::new(
            list.iter()
                .map(|d| (d.driver_id.clone(), Arc::clone(d)))
                .collect(),
        )
    }

    fn trip(id: &str, status: TripStatus) -> Snapshot<Trip> {
        let place = |lat: f64| Place {
            point: GeoPoint::new(lat, -17.46),
            name: None,
        };
        let t = Trip {
            id: id.into(),
            status: Some(status),
            departure: Some(place(14.69)),
            arrival: Some(place(14.72)),
            ..Trip::default()
        };
        Arc::new([(id.to_owned(), Arc::new(t))].into_iter().collect())
    }

    fn no_trips() -> Snapshot<Trip> {
        Arc::new(HashMap::new())
    }

    fn ready_renderer() -> MarkerRenderer<FakeSurface> {
        MarkerRenderer::new(FakeSurface {
            ready: true,
            ..FakeSurface::default()
        })
    }

    #[test]
    fn marker_ids_and_palette() {
        assert_eq!(MarkerId::Driver("D1".into()).to_string(), "driver-D1");
        assert_eq!(MarkerId::TripDeparture("T1".into()).to_string(), "trip-departure-T1");
        assert_eq!(MarkerId::TripArrival("T1".into()).to_string(), "trip-arrival-T1");
        assert_eq!(Palette::AVAILABLE.to_string(), "#10B981");
        assert_eq!(Palette::driver(DriverStatus::Busy).to_string(), "#F59E0B");
        assert_eq!(Palette::ARRIVAL.to_string(), "#EF4444");
    }

    #[test]
    fn moves_in_place_and_removes_filtered() {
        let mut renderer = ready_renderer();
        let dir = DriverDirectory::new();
        let filter = MapFilter::default();

        let d1 = driver("D1", 1, 14.69, DriverStatus::Available);
        let d2 = driver("D2", 1, 14.70, DriverStatus::Busy);
        renderer.render(&drivers(&[d1, d2]), &no_trips(), &filter, &dir);
        let first_handle = *renderer.marker(&MarkerId::Driver("D1".into())).unwrap();

        // D1 moves, D2 goes offline (filtered out).
        let d1 = driver("D1", 2, 14.71, DriverStatus::Available);
        let d2 = driver("D2", 2, 14.70, DriverStatus::Offline);
        let outcome = renderer.render(&drivers(&[d1, d2]), &no_trips(), &filter, &dir);

        assert_eq!(
            outcome,
            RenderOutcome::Applied(ReconcileStats { created: 0, updated: 1, removed: 1 })
        );
        assert_eq!(
            *renderer.marker(&MarkerId::Driver("D1".into())).unwrap(),
            first_handle,
            "persisting marker must not be recreated"
        );
        assert_eq!(renderer.surface().positions["driver-D1"].latitude, 14.71);
        assert_eq!(renderer.rendered_ids(), vec![MarkerId::Driver("D1".into())]);
        let creates = renderer
            .surface()
            .ops
            .iter()
            .filter(|op| **op == Op::Create("driver-D1".into()))
            .count();
        assert_eq!(creates, 1);
    }

    #[test]
    fn trips_render_as_departure_arrival_pairs() {
        let mut renderer = ready_renderer();
        let dir = DriverDirectory::new();
        let filter = MapFilter::default();

        renderer.render(&drivers(&[]), &trip("T1", TripStatus::InTransit), &filter, &dir);
        assert_eq!(
            renderer.rendered_ids(),
            vec![
                MarkerId::TripDeparture("T1".into()),
                MarkerId::TripArrival("T1".into()),
            ]
        );

        // Completed trips fall out of the default filter.
        renderer.render(&drivers(&[]), &trip("T1", TripStatus::Completed), &filter, &dir);
        assert!(renderer.rendered_ids().is_empty());
    }

    #[test]
    fn filter_change_alone_triggers_convergence() {
        let mut renderer = ready_renderer();
        let dir = DriverDirectory::new();
        let snap = drivers(&[driver("D1", 1, 14.69, DriverStatus::Offline)]);

        renderer.render(&snap, &no_trips(), &MapFilter::default(), &dir);
        assert!(renderer.rendered_ids().is_empty());

        let show_all = MapFilter {
            drivers: DriverFilter::All,
            trips: TripFilter::Hidden,
        };
        renderer.render(&snap, &no_trips(), &show_all, &dir);
        assert_eq!(renderer.rendered_ids(), vec![MarkerId::Driver("D1".into())]);
    }

    #[test]
    fn buffers_until_ready_and_applies_only_final_state() {
        let mut renderer = MarkerRenderer::new(FakeSurface::default());
        let dir = DriverDirectory::new();
        let filter = MapFilter::default();

        let a = drivers(&[driver("D1", 1, 14.69, DriverStatus::Available)]);
        let b = drivers(&[driver("D2", 1, 14.69, DriverStatus::Busy)]);

        assert_eq!(renderer.render(&a, &no_trips(), &filter, &dir), RenderOutcome::Buffered);
        assert_eq!(renderer.render(&b, &no_trips(), &filter, &dir), RenderOutcome::Buffered);
        assert!(renderer.surface().ops.is_empty());
        assert!(renderer.has_pending());

        // Still not ready: nothing applied, nothing lost.
        assert_eq!(renderer.surface_ready(), None);
        assert!(renderer.has_pending());

        renderer.surface_mut().ready = true;
        let stats = renderer.surface_ready().unwrap();
        assert_eq!(stats, ReconcileStats { created: 1, updated: 0, removed: 0 });
        assert_eq!(renderer.surface().ops, vec![Op::Create("driver-D2".into())]);
        assert!(!renderer.has_pending());
        assert_eq!(renderer.surface_ready(), None);
    }

    #[test]
    fn labels_come_from_directory() {
        use crate::model::DriverProfile;

        let dir = DriverDirectory::new();
        dir.extend([DriverProfile {
            id: "D1".into(),
            name: Some("Awa Diop".into()),
            phone: None,
            vehicle: None,
            banned: false,
        }]);
        let snap = drivers(&[
            driver("D1", 1, 14.69, DriverStatus::Available),
            driver("drv-98765", 1, 14.69, DriverStatus::Available),
        ]);

        let desired = desired_markers(&snap, &no_trips(), &MapFilter::default(), &dir);
        assert_eq!(desired[&MarkerId::Driver("D1".into())].label, "Awa Diop");
        assert_eq!(desired[&MarkerId::Driver("drv-98765".into())].label, "Driver 8765");
        assert_eq!(
            desired[&MarkerId::Driver("D1".into())].color,
            Palette::AVAILABLE
        );
    }
}
