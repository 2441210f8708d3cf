//! Terminal map surface backing the live-map marker renderer.
//!
//! The surface keeps a layer of placed markers keyed by [`MarkerId`] and
//! a geographic viewport. It reports ready only once the terminal has
//! given it a non-empty area, so markers computed before the first
//! resize are buffered by the renderer and applied in one pass.

use std::collections::BTreeMap;

use yengou_core::model::GeoPoint;
use yengou_core::{MapSurface, MarkerId, MarkerSpec};

/// Smallest span the viewport will zoom or fit to, in degrees.
const MIN_SPAN: f64 = 0.002;
const MAX_SPAN: f64 = 180.0;

/// Dakar city centre.
pub const DEFAULT_CENTER: GeoPoint = GeoPoint {
    latitude: 14.7167,
    longitude: -17.4677,
};

// ── Viewport ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: GeoPoint,
    /// Degrees of latitude visible top to bottom.
    pub span_lat: f64,
    /// Degrees of longitude visible left to right.
    pub span_lng: f64,
}

impl Viewport {
    pub fn new(center: GeoPoint, span: f64) -> Self {
        Self {
            center,
            span_lat: span,
            span_lng: span,
        }
    }

    /// `[min, max]` longitude, the canvas x axis.
    pub fn x_bounds(&self) -> [f64; 2] {
        let half = self.span_lng / 2.0;
        [self.center.longitude - half, self.center.longitude + half]
    }

    /// `[min, max]` latitude, the canvas y axis.
    pub fn y_bounds(&self) -> [f64; 2] {
        let half = self.span_lat / 2.0;
        [self.center.latitude - half, self.center.latitude + half]
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        let [x0, x1] = self.x_bounds();
        let [y0, y1] = self.y_bounds();
        (x0..=x1).contains(&point.longitude) && (y0..=y1).contains(&point.latitude)
    }
}

// ── Surface ──────────────────────────────────────────────────────────

/// Handle the renderer holds for each placed marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerHandle {
    /// Assigned at creation, unchanged by moves.
    pub serial: u64,
}

/// Running totals of surface operations, shown in the map footer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceStats {
    pub created: u64,
    pub moved: u64,
    pub removed: u64,
}

#[derive(Debug)]
pub struct CanvasSurface {
    /// Terminal cells available to the map; `None` before the first layout.
    size: Option<(u16, u16)>,
    viewport: Viewport,
    layer: BTreeMap<MarkerId, MarkerSpec>,
    next_serial: u64,
    stats: SurfaceStats,
}

impl Default for CanvasSurface {
    fn default() -> Self {
        Self::new(Viewport::new(DEFAULT_CENTER, 0.2))
    }
}

impl CanvasSurface {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            size: None,
            viewport,
            layer: BTreeMap::new(),
            next_serial: 1,
            stats: SurfaceStats::default(),
        }
    }

    /// Record the drawable area. Returns `true` if this made the surface
    /// ready for the first time.
    pub fn resize(&mut self, width: u16, height: u16) -> bool {
        let was_ready = self.size.is_some();
        if width == 0 || height == 0 {
            return false;
        }
        self.size = Some((width, height));
        !was_ready
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn markers(&self) -> impl Iterator<Item = (&MarkerId, &MarkerSpec)> {
        self.layer.iter()
    }

    pub fn marker_count(&self) -> usize {
        self.layer.len()
    }

    pub fn stats(&self) -> SurfaceStats {
        self.stats
    }

    /// Shift the view by a fraction of the current span.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.viewport.center.longitude += dx * self.viewport.span_lng;
        self.viewport.center.latitude += dy * self.viewport.span_lat;
    }

    /// Scale the span; factors below 1 zoom in.
    pub fn zoom(&mut self, factor: f64) {
        self.viewport.span_lat = (self.viewport.span_lat * factor).clamp(MIN_SPAN, MAX_SPAN);
        self.viewport.span_lng = (self.viewport.span_lng * factor).clamp(MIN_SPAN, MAX_SPAN);
    }

    /// Frame every placed marker with a 10% margin. No-op when empty.
    pub fn fit(&mut self) -> bool {
        let mut points = self.layer.values().map(|m| m.position);
        let Some(first) = points.next() else {
            return false;
        };
        let (mut lat0, mut lat1, mut lng0, mut lng1) =
            (first.latitude, first.latitude, first.longitude, first.longitude);
        for p in points {
            lat0 = lat0.min(p.latitude);
            lat1 = lat1.max(p.latitude);
            lng0 = lng0.min(p.longitude);
            lng1 = lng1.max(p.longitude);
        }
        self.viewport = Viewport {
            center: GeoPoint::new(f64::midpoint(lat0, lat1), f64::midpoint(lng0, lng1)),
            span_lat: ((lat1 - lat0) * 1.2).clamp(MIN_SPAN, MAX_SPAN),
            span_lng: ((lng1 - lng0) * 1.2).clamp(MIN_SPAN, MAX_SPAN),
        };
        true
    }
}

impl MapSurface for CanvasSurface {
    type Marker = MarkerHandle;

    fn is_ready(&self) -> bool {
        self.size.is_some()
    }

    fn create_marker(&mut self, id: &MarkerId, spec: &MarkerSpec) -> MarkerHandle {
        self.layer.insert(id.clone(), spec.clone());
        self.stats.created += 1;
        let serial = self.next_serial;
        self.next_serial += 1;
        MarkerHandle { serial }
    }

    fn update_marker(&mut self, id: &MarkerId, marker: &mut MarkerHandle, spec: &MarkerSpec) {
        if let Some(placed) = self.layer.get_mut(id) {
            if placed.position != spec.position {
                self.stats.moved += 1;
                tracing::trace!(%id, serial = marker.serial, "marker moved");
            }
            placed.clone_from(spec);
        }
    }

    fn remove_marker(&mut self, id: &MarkerId, _marker: MarkerHandle) {
        if self.layer.remove(id).is_some() {
            self.stats.removed += 1;
        }
    }

    fn project(&self, point: GeoPoint) -> Option<(f64, f64)> {
        let (width, height) = self.size?;
        if !self.viewport.contains(point) {
            return None;
        }
        let [x0, _] = self.viewport.x_bounds();
        let [_, y1] = self.viewport.y_bounds();
        let col = (point.longitude - x0) / self.viewport.span_lng * f64::from(width);
        let row = (y1 - point.latitude) / self.viewport.span_lat * f64::from(height);
        Some((col, row))
    }
}
