//! # Interface Store
//!
//! For a vertex `v` and two of its surroundings `v'`, `v''`, the store
//! remembers the closest crossing observed between the regions of `v'` and
//! `v''` as seen from `v`. A crossing is a pair of states: one represented
//! by `v` (inside) and one represented by the neighbour (outside).
//!
//! Records are keyed by the normalised pair `(min, max)` and owned by `v`.
//! Slot 1 holds the crossing toward the smaller vertex id, slot 2 the one
//! toward the larger.

use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::VertexId;

// ============================================================================
// VertexPair
// ============================================================================

/// Unordered vertex pair, stored as `(min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexPair {
    low: VertexId,
    high: VertexId,
}

impl VertexPair {
    pub fn new(a: VertexId, b: VertexId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> VertexId {
        self.low
    }

    pub fn high(&self) -> VertexId {
        self.high
    }

    pub fn contains(&self, v: VertexId) -> bool {
        self.low == v || self.high == v
    }
}

// ============================================================================
// InterfaceData
// ============================================================================

/// One observed crossing.
#[derive(Debug, Clone)]
pub struct Crossing<S> {
    pub inside: Arc<S>,
    pub outside: Arc<S>,
}

/// Which of the two crossings of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    /// Slot written when the sampled neighbour is `toward` and the other
    /// member of the pair is `other`.
    pub fn toward(toward: VertexId, other: VertexId) -> Self {
        if toward < other { Slot::First } else { Slot::Second }
    }

    pub fn opposite(self) -> Self {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }
}

/// Up to two crossings plus the gap between their inside states.
#[derive(Debug, Clone)]
pub struct InterfaceData<S> {
    interface1: Option<Crossing<S>>,
    interface2: Option<Crossing<S>>,
    last_distance: f64,
}

impl<S> Default for InterfaceData<S> {
    fn default() -> Self {
        Self {
            interface1: None,
            interface2: None,
            last_distance: f64::INFINITY,
        }
    }
}

impl<S> InterfaceData<S> {
    pub fn get(&self, slot: Slot) -> Option<&Crossing<S>> {
        match slot {
            Slot::First => self.interface1.as_ref(),
            Slot::Second => self.interface2.as_ref(),
        }
    }

    pub fn has(&self, slot: Slot) -> bool {
        self.get(slot).is_some()
    }

    pub fn interface1(&self) -> Option<&Crossing<S>> {
        self.interface1.as_ref()
    }

    pub fn interface2(&self) -> Option<&Crossing<S>> {
        self.interface2.as_ref()
    }

    /// Distance between the two inside states, or infinity while either
    /// slot is empty.
    pub fn last_distance(&self) -> f64 {
        self.last_distance
    }

    pub fn is_complete(&self) -> bool {
        self.interface1.is_some() && self.interface2.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.interface1.is_none() && self.interface2.is_none()
    }

    /// Number of states held (two per crossing).
    pub fn states_stored(&self) -> usize {
        2 * (self.interface1.is_some() as usize + self.interface2.is_some() as usize)
    }

    pub fn set<F>(&mut self, slot: Slot, inside: Arc<S>, outside: Arc<S>, dist: F)
    where
        F: Fn(&S, &S) -> f64,
    {
        let crossing = Crossing { inside, outside };
        match slot {
            Slot::First => self.interface1 = Some(crossing),
            Slot::Second => self.interface2 = Some(crossing),
        }
        self.last_distance = match (&self.interface1, &self.interface2) {
            (Some(a), Some(b)) => dist(&a.inside, &b.inside),
            _ => f64::INFINITY,
        };
    }

    /// Offer a new crossing for `slot`. An empty slot takes it; with both
    /// slots filled it replaces the old one only if it narrows the gap to
    /// the other slot. With only the other slot empty nothing changes.
    pub fn offer<F>(&mut self, slot: Slot, inside: Arc<S>, outside: Arc<S>, dist: F) -> bool
    where
        F: Fn(&S, &S) -> f64,
    {
        if !self.has(slot) {
            self.set(slot, inside, outside, dist);
            return true;
        }
        let gap = match self.get(slot.opposite()) {
            Some(other) => dist(&inside, &other.inside),
            None => return false,
        };
        if gap < self.last_distance {
            self.set(slot, inside, outside, dist);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// InterfaceStore
// ============================================================================

/// Per-vertex interface records.
pub struct InterfaceStore<S> {
    records: HashMap<VertexId, HashMap<VertexPair, InterfaceData<S>>>,
}

impl<S> Default for InterfaceStore<S> {
    fn default() -> Self {
        Self { records: HashMap::new() }
    }
}

impl<S> InterfaceStore<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a record without creating it.
    pub fn get(&self, owner: VertexId, pair: VertexPair) -> Option<&InterfaceData<S>> {
        self.records.get(&owner).and_then(|m| m.get(&pair))
    }

    pub fn get_or_create(&mut self, owner: VertexId, pair: VertexPair) -> &mut InterfaceData<S> {
        self.records
            .entry(owner)
            .or_default()
            .entry(pair)
            .or_default()
    }

    /// Drop every record owned by `owner`.
    pub fn clear_vertex(&mut self, owner: VertexId) -> usize {
        self.records.remove(&owner).map(|m| m.len()).unwrap_or(0)
    }

    /// Drop every record, on any owner, whose pair mentions `v`.
    pub fn purge_references(&mut self, v: VertexId) -> usize {
        let mut purged = 0;
        for map in self.records.values_mut() {
            let before = map.len();
            map.retain(|pair, _| !pair.contains(v));
            purged += before - map.len();
        }
        self.records.retain(|_, m| !m.is_empty());
        purged
    }

    /// First owner other than `v` holding a record whose pair mentions `v`.
    pub fn find_foreign_reference(&self, v: VertexId) -> Option<VertexId> {
        self.records
            .iter()
            .filter(|(owner, _)| **owner != v)
            .find(|(_, m)| m.keys().any(|p| p.contains(v)))
            .map(|(owner, _)| *owner)
    }

    pub fn records_of(&self, owner: VertexId) -> impl Iterator<Item = (&VertexPair, &InterfaceData<S>)> {
        self.records.get(&owner).into_iter().flat_map(|m| m.iter())
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.records.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(states stored, empty crossing slots)` across all records.
    pub fn storage_size(&self) -> (usize, usize) {
        self.records
            .values()
            .flat_map(|m| m.values())
            .fold((0, 0), |(stored, missing), d| {
                let filled = d.interface1.is_some() as usize + d.interface2.is_some() as usize;
                (stored + d.states_stored(), missing + 2 - filled)
            })
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
