//! State and motion caches.
//!
//! `StateCache` is the single owner of every configuration the engine has
//! been handed or has cloned. Vertices, interface records and queries hold
//! `Arc` handles into it, so nothing is copied implicitly.
//!
//! `MotionCache` remembers the outcome of motion checks between two cached
//! states. Results never change for a fixed pair of states, so entries are
//! never invalidated.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use crate::model::StateId;
use crate::{Error, Result};
use super::GeometryOracle;

// ============================================================================
// StateCache
// ============================================================================

/// Append-only store of configurations. Slot 0 is the null state.
pub struct StateCache<S> {
    states: RwLock<Vec<Option<Arc<S>>>>,
}

impl<S> StateCache<S> {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(vec![None]),
        }
    }

    /// Move a configuration into the cache.
    pub fn insert(&self, state: S) -> StateId {
        self.insert_arc(Arc::new(state))
    }

    pub fn insert_arc(&self, state: Arc<S>) -> StateId {
        let mut states = self.states.write();
        let id = StateId(states.len() as u64);
        states.push(Some(state));
        id
    }

    pub fn get(&self, id: StateId) -> Result<Arc<S>> {
        self.states
            .read()
            .get(id.0 as usize)
            .and_then(|s| s.clone())
            .ok_or(Error::StateNotFound(id))
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.get(id).is_ok()
    }

    /// Number of stored states, not counting the null slot.
    pub fn len(&self) -> usize {
        self.states.read().len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All non-null ids in insertion order.
    pub fn ids(&self) -> Vec<StateId> {
        (1..=self.len() as u64).map(StateId).collect()
    }
}

impl<S> Default for StateCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MotionCache
// ============================================================================

/// Memoised motion validity per unordered state pair.
pub struct MotionCache {
    results: Mutex<HashMap<(StateId, StateId), bool>>,
    total_checks: AtomicU64,
    cached_checks: AtomicU64,
}

impl MotionCache {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(HashMap::new()),
            total_checks: AtomicU64::new(0),
            cached_checks: AtomicU64::new(0),
        }
    }

    fn key(a: StateId, b: StateId) -> (StateId, StateId) {
        if a <= b { (a, b) } else { (b, a) }
    }

    /// Check the motion between two cached states, consulting the oracle
    /// only on a miss. Identical ids are trivially valid.
    pub fn check_motion<O: GeometryOracle>(
        &self,
        oracle: &O,
        states: &StateCache<O::State>,
        a: StateId,
        b: StateId,
    ) -> Result<bool> {
        self.total_checks.fetch_add(1, Ordering::Relaxed);
        if a == b {
            self.cached_checks.fetch_add(1, Ordering::Relaxed);
            return Ok(true);
        }

        let key = Self::key(a, b);
        if let Some(valid) = self.results.lock().get(&key).copied() {
            self.cached_checks.fetch_add(1, Ordering::Relaxed);
            return Ok(valid);
        }

        // Lock released while the oracle runs; a racing worker may compute
        // the same pair, which is harmless.
        let sa = states.get(a)?;
        let sb = states.get(b)?;
        let valid = oracle.motion_valid(&sa, &sb);
        self.results.lock().insert(key, valid);
        Ok(valid)
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_checks(&self) -> u64 {
        self.total_checks.load(Ordering::Relaxed)
    }

    pub fn cached_checks(&self) -> u64 {
        self.cached_checks.load(Ordering::Relaxed)
    }

    /// Share of checks answered without the oracle, in percent.
    pub fn percent_cached(&self) -> f64 {
        let total = self.total_checks();
        if total == 0 {
            return 0.0;
        }
        self.cached_checks() as f64 / total as f64 * 100.0
    }

    pub fn reset_counters(&self) {
        self.total_checks.store(0, Ordering::Relaxed);
        self.cached_checks.store(0, Ordering::Relaxed);
    }
}

impl Default for MotionCache {
    fn default() -> Self {
        Self::new()
    }
}
