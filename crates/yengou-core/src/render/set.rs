// ── Generic set reconciler ──
//
// Desired-set vs rendered-set diff with create/update/destroy callbacks.
// A key present in two consecutive passes is always updated in place,
// never destroyed and recreated.

use std::collections::BTreeMap;

/// A stateful resource a [`SetReconciler`] drives.
pub trait RenderTarget<K, V> {
    /// Whatever the target needs to find the resource again.
    type Handle;

    fn create(&mut self, key: &K, value: &V) -> Self::Handle;
    fn update(&mut self, key: &K, handle: &mut Self::Handle, value: &V);
    fn destroy(&mut self, key: &K, handle: Self::Handle);
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

impl ReconcileStats {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.removed == 0 && self.updated == 0
    }
}

/// Tracks which keys are currently rendered and their handles.
#[derive(Debug)]
pub struct SetReconciler<K: Ord + Clone, H> {
    rendered: BTreeMap<K, H>,
}

impl<K: Ord + Clone, H> Default for SetReconciler<K, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, H> SetReconciler<K, H> {
    pub fn new() -> Self {
        Self {
            rendered: BTreeMap::new(),
        }
    }

    /// Converge the target onto `desired`.
    pub fn reconcile<V, R>(&mut self, desired: &BTreeMap<K, V>, target: &mut R) -> ReconcileStats
    where
        R: RenderTarget<K, V, Handle = H>,
    {
        let mut stats = ReconcileStats::default();

        for (key, value) in desired {
            if let Some(handle) = self.rendered.get_mut(key) {
                target.update(key, handle, value);
                stats.updated += 1;
            } else {
                let handle = target.create(key, value);
                self.rendered.insert(key.clone(), handle);
                stats.created += 1;
            }
        }

        let gone: Vec<K> = self
            .rendered
            .keys()
            .filter(|k| !desired.contains_key(*k))
            .cloned()
            .collect();
        for key in gone {
            if let Some(handle) = self.rendered.remove(&key) {
                target.destroy(&key, handle);
                stats.removed += 1;
            }
        }

        stats
    }

    /// Destroy everything currently rendered.
    pub fn clear<V, R>(&mut self, target: &mut R) -> usize
    where
        R: RenderTarget<K, V, Handle = H>,
    {
        let n = self.rendered.len();
        for (key, handle) in std::mem::take(&mut self.rendered) {
            target.destroy(&key, handle);
        }
        n
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.rendered.keys()
    }

    pub fn get(&self, key: &K) -> Option<&H> {
        self.rendered.get(key)
    }

    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Table rows identified by a serial number that changes on recreate.
    #[derive(Default)]
    struct Rows {
        next_serial: u32,
        live: BTreeMap<String, (u32, i32)>,
    }

    impl RenderTarget<String, i32> for Rows {
        type Handle = u32;

        fn create(&mut self, key: &String, value: &i32) -> u32 {
            self.next_serial += 1;
            self.live.insert(key.clone(), (self.next_serial, *value));
            self.next_serial
        }

        fn update(&mut self, key: &String, handle: &mut u32, value: &i32) {
            self.live.insert(key.clone(), (*handle, *value));
        }

        fn destroy(&mut self, key: &String, _handle: u32) {
            self.live.remove(key);
        }
    }

    fn desired(items: &[(&str, i32)]) -> BTreeMap<String, i32> {
        items.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect()
    }

    #[test]
    fn converges_and_updates_in_place() {
        let mut rows = Rows::default();
        let mut set: SetReconciler<String, u32> = SetReconciler::new();

        let stats = set.reconcile(&desired(&[("a", 1), ("b", 2)]), &mut rows);
        assert_eq!(stats, ReconcileStats { created: 2, updated: 0, removed: 0 });
        let serial_a = rows.live["a"].0;

        let stats = set.reconcile(&desired(&[("a", 10), ("c", 3)]), &mut rows);
        assert_eq!(stats, ReconcileStats { created: 1, updated: 1, removed: 1 });

        // "a" persisted across passes: same serial, new value.
        assert_eq!(rows.live["a"], (serial_a, 10));
        assert!(!rows.live.contains_key("b"));
        assert_eq!(
            set.keys().cloned().collect::<Vec<_>>(),
            rows.live.keys().cloned().collect::<Vec<_>>()
        );
    }

    #[test]
    fn rendered_set_always_equals_desired_set() {
        let mut rows = Rows::default();
        let mut set: SetReconciler<String, u32> = SetReconciler::new();
        let passes: [&[(&str, i32)]; 5] = [
            &[("a", 1)],
            &[],
            &[("a", 1), ("b", 1), ("c", 1)],
            &[("c", 2)],
            &[("d", 1), ("c", 3)],
        ];

        for pass in passes {
            let want = desired(pass);
            set.reconcile(&want, &mut rows);
            assert_eq!(
                set.keys().cloned().collect::<Vec<_>>(),
                want.keys().cloned().collect::<Vec<_>>()
            );
            assert_eq!(rows.live.len(), want.len());
        }
    }

    #[test]
    fn clear_destroys_everything() {
        let mut rows = Rows::default();
        let mut set: SetReconciler<String, u32> = SetReconciler::new();
        set.reconcile(&desired(&[("a", 1), ("b", 2)]), &mut rows);

        assert_eq!(set.clear::<i32, _>(&mut rows), 2);
        assert!(set.is_empty());
        assert!(rows.live.is_empty());
    }
}
