// ── Reconciliation renderers ──
//
// Converge stateful external resources (map markers, table rows) onto
// the reconcilers' snapshots by diffing desired against rendered.

mod filter;
mod marker;
mod set;

pub use filter::{DriverFilter, MapFilter, TripFilter};
pub use marker::{
    MapSurface, MarkerId, MarkerKind, MarkerRenderer, MarkerSpec, Palette, RenderOutcome, Rgb,
    desired_markers,
};
pub use set::{ReconcileStats, RenderTarget, SetReconciler};
