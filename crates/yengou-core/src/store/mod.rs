// ── Reactive keyed state ──
//
// One reconciler per entity kind. All mutation funnels through the
// acceptance rule in `rules`; callers only read snapshots.

mod reconciler;
mod rules;

pub use reconciler::{Acceptance, Change, Reconcile, Reconciler, Snapshot};
