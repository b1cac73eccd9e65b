//! # Spatial Index
//!
//! Nearest-neighbour lookups over the configurations of live sparse
//! vertices. Entries are kept in a slot vector indexed by `VertexId` and
//! scanned linearly; results are ordered by ascending distance with ties
//! broken by vertex id, so lookups are deterministic.
//!
//! ## Query slots
//!
//! Each worker thread owns one query slot. A lookup parks its query state
//! in the slot for the duration of the scan and the slot is emptied when
//! the `QueryGuard` drops, so no transient query state outlives the call
//! that created it.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use crate::model::VertexId;
use crate::{Error, Result};

// ============================================================================
// Query slots
// ============================================================================

/// One transient query state per worker thread.
pub struct QuerySlots<S> {
    slots: Vec<Mutex<Option<Arc<S>>>>,
}

impl<S> QuerySlots<S> {
    pub fn new(num_threads: usize) -> Self {
        Self {
            slots: (0..num_threads.max(1)).map(|_| Mutex::new(None)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Park `state` in the slot of `thread_id` until the guard drops.
    pub fn occupy(&self, thread_id: usize, state: Arc<S>) -> Result<QueryGuard<'_, S>> {
        let slot = self.slots.get(thread_id).ok_or_else(|| {
            Error::Config(format!(
                "no query slot for thread {thread_id} ({} configured)",
                self.slots.len()
            ))
        })?;
        let mut guard = slot.lock();
        *guard = Some(state);
        Ok(QueryGuard { guard })
    }

    /// Whether the slot currently holds a query state.
    pub fn in_use(&self, thread_id: usize) -> bool {
        self.slots
            .get(thread_id)
            .and_then(|s| s.try_lock())
            .map(|s| s.is_some())
            .unwrap_or(true)
    }
}

/// Scoped occupancy of a query slot.
pub struct QueryGuard<'a, S> {
    guard: MutexGuard<'a, Option<Arc<S>>>,
}

impl<S> QueryGuard<'_, S> {
    pub fn state(&self) -> Option<&S> {
        self.guard.as_deref()
    }
}

impl<S> Drop for QueryGuard<'_, S> {
    fn drop(&mut self) {
        *self.guard = None;
    }
}

// ============================================================================
// SpatialIndex
// ============================================================================

/// A neighbour returned by a lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub vertex: VertexId,
    pub distance: f64,
}

/// Linear-scan nearest-neighbour structure over vertex states.
pub struct SpatialIndex<S> {
    entries: Vec<Option<Arc<S>>>,
    live: usize,
    slots: QuerySlots<S>,
}

impl<S> SpatialIndex<S> {
    pub fn new(num_threads: usize) -> Self {
        Self {
            entries: Vec::new(),
            live: 0,
            slots: QuerySlots::new(num_threads),
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn slots(&self) -> &QuerySlots<S> {
        &self.slots
    }

    pub fn insert(&mut self, v: VertexId, state: Arc<S>) {
        let i = v.index();
        if self.entries.len() <= i {
            self.entries.resize_with(i + 1, || None);
        }
        if self.entries[i].replace(state).is_none() {
            self.live += 1;
        }
    }

    pub fn remove(&mut self, v: VertexId) -> bool {
        match self.entries.get_mut(v.index()).and_then(Option::take) {
            Some(_) => {
                self.live -= 1;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, v: VertexId) -> bool {
        matches!(self.entries.get(v.index()), Some(Some(_)))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.live = 0;
    }

    fn scan<F>(&self, query: &S, dist: F) -> Vec<Neighbor>
    where
        F: Fn(&S, &S) -> f64,
    {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| {
                e.as_ref().map(|s| Neighbor {
                    vertex: VertexId(i as u32),
                    distance: dist(query, s),
                })
            })
            .collect()
    }

    fn sort(neighbors: &mut [Neighbor]) {
        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.vertex.cmp(&b.vertex))
        });
    }

    /// All vertices within `radius` of `query`, nearest first.
    pub fn nearest_r<F>(
        &self,
        thread_id: usize,
        query: Arc<S>,
        radius: f64,
        dist: F,
    ) -> Result<Vec<Neighbor>>
    where
        F: Fn(&S, &S) -> f64,
    {
        let slot = self.slots.occupy(thread_id, query)?;
        let Some(q) = slot.state() else {
            return Ok(Vec::new());
        };
        let mut found: Vec<Neighbor> = self
            .scan(q, dist)
            .into_iter()
            .filter(|n| n.distance <= radius)
            .collect();
        Self::sort(&mut found);
        trace!(thread_id, radius, found = found.len(), "nearest_r");
        Ok(found)
    }

    /// The `k` vertices closest to `query`, nearest first.
    pub fn nearest_k<F>(
        &self,
        thread_id: usize,
        query: Arc<S>,
        k: usize,
        dist: F,
    ) -> Result<Vec<Neighbor>>
    where
        F: Fn(&S, &S) -> f64,
    {
        let slot = self.slots.occupy(thread_id, query)?;
        let Some(q) = slot.state() else {
            return Ok(Vec::new());
        };
        let mut found = self.scan(q, dist);
        Self::sort(&mut found);
        found.truncate(k);
        trace!(thread_id, k, found = found.len(), "nearest_k");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(a: &(f64, f64), b: &(f64, f64)) -> f64 {
        (a.0 - b.0).hypot(a.1 - b.1)
    }

    fn index() -> SpatialIndex<(f64, f64)> {
        let mut idx = SpatialIndex::new(2);
        idx.insert(VertexId(0), Arc::new((0.0, 0.0)));
        idx.insert(VertexId(1), Arc::new((3.0, 0.0)));
        idx.insert(VertexId(2), Arc::new((1.0, 0.0)));
        idx.insert(VertexId(3), Arc::new((1.0, 0.0)));
        idx
    }

    #[test]
    fn radius_results_are_sorted_with_id_tiebreak() {
        let idx = index();
        let found = idx.nearest_r(0, Arc::new((0.9, 0.0)), 1.5, dist).unwrap();
        let ids: Vec<u32> = found.iter().map(|n| n.vertex.0).collect();
        assert_eq!(ids, vec![2, 3, 0]);
    }

    #[test]
    fn k_nearest_truncates() {
        let idx = index();
        let found = idx.nearest_k(1, Arc::new((3.1, 0.0)), 2, dist).unwrap();
        let ids: Vec<u32> = found.iter().map(|n| n.vertex.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn removed_entries_are_invisible() {
        let mut idx = index();
        assert!(idx.remove(VertexId(2)));
        assert!(!idx.remove(VertexId(2)));
        assert_eq!(idx.len(), 3);
        let found = idx.nearest_k(0, Arc::new((1.0, 0.0)), 1, dist).unwrap();
        assert_eq!(found[0].vertex, VertexId(3));
    }

    #[test]
    fn query_slot_is_cleared_after_lookup() {
        let idx = index();
        assert!(!idx.slots().in_use(0));
        {
            let guard = idx.slots().occupy(0, Arc::new((5.0, 5.0))).unwrap();
            assert_eq!(guard.state(), Some(&(5.0, 5.0)));
            assert!(idx.slots().in_use(0));
            assert!(!idx.slots().in_use(1));
        }
        assert!(!idx.slots().in_use(0));
        idx.nearest_r(0, Arc::new((0.0, 0.0)), 1.0, dist).unwrap();
        assert!(!idx.slots().in_use(0));
    }

    #[test]
    fn unknown_thread_is_a_config_error() {
        let idx = index();
        assert!(matches!(
            idx.nearest_r(7, Arc::new((0.0, 0.0)), 1.0, dist),
            Err(Error::Config(_))
        ));
    }
}
