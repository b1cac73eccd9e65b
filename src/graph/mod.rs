//! # Sparse Graph
//!
//! Arena storage for sparse vertices and edges, plus the services built on
//! it: connectivity tracking, shortest paths, lazy edge collision states and
//! interface bookkeeping.
//!
//! ## Storage
//!
//! | Table | Keyed by | Notes |
//! |-------|----------|-------|
//! | vertices | `VertexId` | live, tombstoned (removed this pass) or free |
//! | edges | `EdgeId` | freed immediately on removal |
//! | edge lookup | normalised `(VertexId, VertexId)` | at most one edge per pair |
//! | spatial index | `VertexId` | live vertices only |
//! | interface store | owner `VertexId` | cleared before a vertex goes |
//!
//! Vertex ids are never reused inside a construction pass. Tombstones only
//! become free slots in `remove_deleted_vertices`.

pub mod astar;
pub mod disjoint_sets;
pub mod smoothing;

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::config::ResolvedConfig;
use crate::geometry::{GeometryOracle, MotionCache, StateCache};
use crate::index::{Neighbor, SpatialIndex};
use crate::interface::{InterfaceStore, Slot, VertexPair};
use crate::model::*;
use crate::{Error, Result};

pub use disjoint_sets::DisjointSets;

/// Query slot used by maintenance lookups that run under the writer.
pub const MAINTENANCE_SLOT: usize = 0;

enum VertexSlot<S> {
    Live(SparseVertex<S>),
    Removed,
    Free,
}

// ============================================================================
// SparseGraph
// ============================================================================

pub struct SparseGraph<O: GeometryOracle> {
    oracle: Arc<O>,
    states: Arc<StateCache<O::State>>,
    motions: Arc<MotionCache>,
    config: ResolvedConfig,

    vertices: Vec<VertexSlot<O::State>>,
    tombstones: Vec<VertexId>,
    free_vertices: Vec<VertexId>,
    live_vertices: usize,

    edges: Vec<Option<SparseEdge>>,
    free_edges: Vec<EdgeId>,
    edge_lookup: HashMap<(VertexId, VertexId), EdgeId>,

    index: SpatialIndex<O::State>,
    sets: DisjointSets,
    interfaces: InterfaceStore<O::State>,
}

fn edge_key(a: VertexId, b: VertexId) -> (VertexId, VertexId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl<O: GeometryOracle> SparseGraph<O> {
    pub fn new(
        oracle: Arc<O>,
        states: Arc<StateCache<O::State>>,
        motions: Arc<MotionCache>,
        config: ResolvedConfig,
    ) -> Self {
        let index = SpatialIndex::new(config.num_threads);
        Self {
            oracle,
            states,
            motions,
            config,
            vertices: Vec::new(),
            tombstones: Vec::new(),
            free_vertices: Vec::new(),
            live_vertices: 0,
            edges: Vec::new(),
            free_edges: Vec::new(),
            edge_lookup: HashMap::new(),
            index,
            sets: DisjointSets::new(),
            interfaces: InterfaceStore::new(),
        }
    }

    pub fn oracle(&self) -> &Arc<O> {
        &self.oracle
    }

    pub fn states(&self) -> &Arc<StateCache<O::State>> {
        &self.states
    }

    pub fn motions(&self) -> &Arc<MotionCache> {
        &self.motions
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn index(&self) -> &SpatialIndex<O::State> {
        &self.index
    }

    pub fn interfaces(&self) -> &InterfaceStore<O::State> {
        &self.interfaces
    }

    pub fn interfaces_mut(&mut self) -> &mut InterfaceStore<O::State> {
        &mut self.interfaces
    }

    // ========================================================================
    // Vertex access
    // ========================================================================

    pub fn num_vertices(&self) -> usize {
        self.live_vertices
    }

    pub fn num_edges(&self) -> usize {
        self.edge_lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live_vertices == 0
    }

    pub fn vertex(&self, v: VertexId) -> Option<&SparseVertex<O::State>> {
        match self.vertices.get(v.index()) {
            Some(VertexSlot::Live(vertex)) => Some(vertex),
            _ => None,
        }
    }

    fn vertex_mut(&mut self, v: VertexId) -> Option<&mut SparseVertex<O::State>> {
        match self.vertices.get_mut(v.index()) {
            Some(VertexSlot::Live(vertex)) => Some(vertex),
            _ => None,
        }
    }

    pub fn live_vertex(&self, v: VertexId) -> Result<&SparseVertex<O::State>> {
        self.vertex(v).ok_or(Error::VertexNotFound(v))
    }

    pub fn is_live(&self, v: VertexId) -> bool {
        self.vertex(v).is_some()
    }

    /// Removed during this pass and not yet recycled.
    pub fn is_removed(&self, v: VertexId) -> bool {
        matches!(self.vertices.get(v.index()), Some(VertexSlot::Removed))
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.iter().filter_map(|slot| match slot {
            VertexSlot::Live(v) => Some(v.id),
            _ => None,
        })
    }

    pub fn vertex_type(&self, v: VertexId) -> Result<VertexType> {
        Ok(self.live_vertex(v)?.kind)
    }

    pub fn get_vertex_state(&self, v: VertexId) -> Result<Arc<O::State>> {
        Ok(self.live_vertex(v)?.state.clone())
    }

    pub fn get_state_id(&self, v: VertexId) -> Result<StateId> {
        Ok(self.live_vertex(v)?.state_id)
    }

    pub fn popularity(&self, v: VertexId) -> Result<f64> {
        Ok(self.live_vertex(v)?.popularity)
    }

    pub fn neighbors(&self, v: VertexId) -> SmallVec<[VertexId; 8]> {
        self.vertex(v)
            .map(|vertex| vertex.neighbors().collect())
            .unwrap_or_default()
    }

    /// Neighbours of `v1` other than `v2` that share no edge with `v2`.
    pub fn adjacent_unconnected(&self, v1: VertexId, v2: VertexId) -> SmallVec<[VertexId; 8]> {
        self.neighbors(v1)
            .into_iter()
            .filter(|&x| x != v2 && !self.has_edge(x, v2))
            .collect()
    }

    // ========================================================================
    // Edge access
    // ========================================================================

    pub fn has_edge(&self, a: VertexId, b: VertexId) -> bool {
        self.edge_lookup.contains_key(&edge_key(a, b))
    }

    pub fn edge_between(&self, a: VertexId, b: VertexId) -> Option<EdgeId> {
        self.edge_lookup.get(&edge_key(a, b)).copied()
    }

    pub fn edge(&self, e: EdgeId) -> Option<&SparseEdge> {
        self.edges.get(e.index()).and_then(Option::as_ref)
    }

    fn live_edge(&self, e: EdgeId) -> Result<&SparseEdge> {
        self.edge(e)
            .ok_or_else(|| Error::InvariantViolation(format!("edge {e} does not exist")))
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().flatten().map(|e| e.id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &SparseEdge> + '_ {
        self.edges.iter().flatten()
    }

    pub fn edge_type(&self, e: EdgeId) -> Result<EdgeType> {
        Ok(self.live_edge(e)?.kind)
    }

    pub fn edge_weight(&self, e: EdgeId) -> Result<f64> {
        Ok(self.live_edge(e)?.weight)
    }

    // ========================================================================
    // Geometry helpers
    // ========================================================================

    pub fn distance(&self, a: VertexId, b: VertexId) -> Result<f64> {
        let sa = &self.live_vertex(a)?.state;
        let sb = &self.live_vertex(b)?.state;
        Ok(self.oracle.distance(sa, sb))
    }

    /// Motion validity between two vertices through the motion cache.
    pub fn motion_between(&self, a: VertexId, b: VertexId) -> Result<bool> {
        let sa = self.get_state_id(a)?;
        let sb = self.get_state_id(b)?;
        self.motions.check_motion(&*self.oracle, &self.states, sa, sb)
    }

    pub fn nearest_r(&self, thread_id: usize, query: Arc<O::State>, radius: f64) -> Result<Vec<Neighbor>> {
        let oracle = &self.oracle;
        self.index.nearest_r(thread_id, query, radius, |a, b| oracle.distance(a, b))
    }

    pub fn nearest_k(&self, thread_id: usize, query: Arc<O::State>, k: usize) -> Result<Vec<Neighbor>> {
        let oracle = &self.oracle;
        self.index.nearest_k(thread_id, query, k, |a, b| oracle.distance(a, b))
    }

    /// Nearest vertex within the visibility radius that `state` can reach
    /// directly.
    pub fn sparse_representative(&self, thread_id: usize, state: Arc<O::State>) -> Result<Option<VertexId>> {
        let neighbors = self.nearest_r(thread_id, state.clone(), self.config.sparse_delta)?;
        for n in neighbors {
            let vs = &self.live_vertex(n.vertex)?.state;
            if self.oracle.equal_states(&state, vs) || self.oracle.motion_valid(&state, vs) {
                return Ok(Some(n.vertex));
            }
        }
        Ok(None)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Add a vertex for a state already held by the state cache.
    pub fn add_vertex(&mut self, state_id: StateId, kind: VertexType) -> Result<VertexId> {
        let state = self.states.get(state_id)?;
        let id = match self.free_vertices.pop() {
            Some(id) => id,
            None => {
                self.vertices.push(VertexSlot::Free);
                VertexId((self.vertices.len() - 1) as u32)
            }
        };

        self.vertices[id.index()] = VertexSlot::Live(SparseVertex::new(id, state_id, state.clone(), kind));
        self.index.insert(id, state);
        self.sets.make_set(id);
        self.live_vertices += 1;

        debug!(vertex = %id, state = %state_id, kind = ?kind, "add_vertex");
        Ok(id)
    }

    /// Clone `state` into the cache and add a vertex owning the copy.
    pub fn add_vertex_from_state(&mut self, state: &O::State, kind: VertexType) -> Result<VertexId> {
        let state_id = self.states.insert(self.oracle.clone_state(state));
        self.add_vertex(state_id, kind)
    }

    pub fn add_edge(&mut self, a: VertexId, b: VertexId, kind: EdgeType) -> Result<EdgeId> {
        if a == b {
            return Err(Error::SelfLoop(a));
        }
        if self.has_edge(a, b) {
            return Err(Error::DuplicateEdge { a, b });
        }
        let weight = self.distance(a, b)?;

        let id = match self.free_edges.pop() {
            Some(id) => id,
            None => {
                self.edges.push(None);
                EdgeId((self.edges.len() - 1) as u32)
            }
        };
        self.edges[id.index()] = Some(SparseEdge::new(id, a, b, weight, kind));
        self.edge_lookup.insert(edge_key(a, b), id);
        for (from, to) in [(a, b), (b, a)] {
            if let Some(vertex) = self.vertex_mut(from) {
                vertex.adjacency.push((to, id));
            }
        }
        self.sets.union(a, b);

        debug!(edge = %id, a = %a, b = %b, kind = ?kind, weight, "add_edge");
        Ok(id)
    }

    /// Tombstone a vertex and drop its incident edges. Interface records
    /// owned by `v` go with it; records elsewhere that still mention `v`
    /// must have been cleared by the caller. On error nothing changes.
    pub fn remove_vertex(&mut self, v: VertexId) -> Result<()> {
        self.live_vertex(v)?;
        if let Some(owner) = self.interfaces.find_foreign_reference(v) {
            return Err(Error::DanglingInterface { owner, removed: v });
        }
        self.interfaces.clear_vertex(v);

        let adjacency = match self.vertex_mut(v) {
            Some(vertex) => std::mem::take(&mut vertex.adjacency),
            None => return Err(Error::VertexNotFound(v)),
        };
        for (n, e) in adjacency {
            if let Some(neighbor) = self.vertex_mut(n) {
                neighbor.adjacency.retain(|(_, edge)| *edge != e);
            }
            self.edge_lookup.remove(&edge_key(v, n));
            self.edges[e.index()] = None;
            self.free_edges.push(e);
        }

        self.index.remove(v);
        self.vertices[v.index()] = VertexSlot::Removed;
        self.tombstones.push(v);
        self.live_vertices -= 1;
        self.rebuild_sets();

        debug!(vertex = %v, "remove_vertex");
        Ok(())
    }

    /// Turn this pass's tombstones into reusable slots.
    pub fn remove_deleted_vertices(&mut self) -> usize {
        let freed = self.tombstones.len();
        for v in self.tombstones.drain(..) {
            self.vertices[v.index()] = VertexSlot::Free;
            self.free_vertices.push(v);
        }
        // Highest id last so pop() hands out the lowest free id first
        self.free_vertices.sort_unstable_by(|a, b| b.cmp(a));
        if freed > 0 {
            self.rebuild_sets();
            debug!(freed, "remove_deleted_vertices");
        }
        freed
    }

    fn rebuild_sets(&mut self) {
        self.sets.clear();
        for i in 0..self.vertices.len() {
            self.sets.make_set(VertexId(i as u32));
        }
        let pairs: Vec<(VertexId, VertexId)> = self.edges().map(|e| (e.a, e.b)).collect();
        for (a, b) in pairs {
            self.sets.union(a, b);
        }
    }

    // ========================================================================
    // Connectivity
    // ========================================================================

    pub fn same_component(&self, a: VertexId, b: VertexId) -> bool {
        self.is_live(a) && self.is_live(b) && self.sets.same_set(a, b)
    }

    /// Live members of each set, keyed by set root.
    pub fn get_disjoint_sets(&self) -> BTreeMap<VertexId, Vec<VertexId>> {
        let mut sets: BTreeMap<VertexId, Vec<VertexId>> = BTreeMap::new();
        for v in self.vertex_ids() {
            sets.entry(self.sets.find(v)).or_default().push(v);
        }
        sets
    }

    pub fn get_disjoint_sets_count(&self) -> usize {
        self.get_disjoint_sets().len()
    }

    /// Recompute components by breadth-first search and compare them with
    /// the union-find partition.
    pub fn check_connected_components(&self) -> Result<()> {
        let mut label: HashMap<VertexId, usize> = HashMap::new();
        let mut next = 0;
        for start in self.vertex_ids() {
            if label.contains_key(&start) {
                continue;
            }
            let mut queue = VecDeque::from([start]);
            label.insert(start, next);
            while let Some(v) = queue.pop_front() {
                for n in self.neighbors(v) {
                    if !label.contains_key(&n) {
                        label.insert(n, next);
                        queue.push_back(n);
                    }
                }
            }
            next += 1;
        }

        let mut root_of_label: HashMap<usize, VertexId> = HashMap::new();
        let mut label_of_root: HashMap<VertexId, usize> = HashMap::new();
        for (v, l) in &label {
            let root = self.sets.find(*v);
            if *root_of_label.entry(*l).or_insert(root) != root
                || *label_of_root.entry(root).or_insert(*l) != *l
            {
                return Err(Error::InvariantViolation(format!(
                    "disjoint sets disagree with graph search at vertex {v}"
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Lazy edge collision states
    // ========================================================================

    /// Collision-check an edge once; later calls read the cached state.
    pub fn check_edge(&mut self, e: EdgeId) -> Result<bool> {
        let edge = self.live_edge(e)?;
        match edge.collision {
            EdgeCollisionState::Free => return Ok(true),
            EdgeCollisionState::InCollision => return Ok(false),
            EdgeCollisionState::NotChecked => {}
        }
        let valid = self.motion_between(edge.a, edge.b)?;
        if let Some(edge) = self.edges[e.index()].as_mut() {
            edge.collision = if valid {
                EdgeCollisionState::Free
            } else {
                EdgeCollisionState::InCollision
            };
        }
        trace!(edge = %e, valid, "check_edge");
        Ok(valid)
    }

    /// Check every edge of a path, marking all invalid ones.
    pub fn validate_path(&mut self, path: &VertexPath) -> Result<bool> {
        let mut all_free = true;
        for (a, b) in path.segments() {
            let e = self.edge_between(a, b).ok_or_else(|| {
                Error::InvariantViolation(format!("path uses missing edge {a}-{b}"))
            })?;
            if !self.check_edge(e)? {
                all_free = false;
            }
        }
        Ok(all_free)
    }

    pub fn clear_edge_collision_states(&mut self) {
        for edge in self.edges.iter_mut().flatten() {
            edge.collision = EdgeCollisionState::NotChecked;
        }
    }

    /// Record that a path was used: bump vertex popularity and, with
    /// popularity bias on, cheapen its edges.
    pub fn reinforce_path(&mut self, path: &VertexPath) -> Result<()> {
        for &v in &path.vertices {
            self.vertex_mut(v).ok_or(Error::VertexNotFound(v))?.popularity += 1.0;
        }
        if !self.config.popularity_bias_enabled {
            return Ok(());
        }
        let reduction = self.config.popularity_reduction;
        for (a, b) in path.segments() {
            let e = self.edge_between(a, b).ok_or_else(|| {
                Error::InvariantViolation(format!("path uses missing edge {a}-{b}"))
            })?;
            if let Some(edge) = self.edges[e.index()].as_mut() {
                edge.weight = (edge.weight - reduction).max(0.0);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Interface bookkeeping
    // ========================================================================

    /// Offer a crossing to the record of `owner` for the pair `(toward,
    /// other)`, creating the record if needed.
    pub fn record_crossing(
        &mut self,
        owner: VertexId,
        toward: VertexId,
        other: VertexId,
        inside: Arc<O::State>,
        outside: Arc<O::State>,
    ) -> bool {
        let oracle = &self.oracle;
        self.interfaces
            .get_or_create(owner, VertexPair::new(toward, other))
            .offer(Slot::toward(toward, other), inside, outside, |a, b| oracle.distance(a, b))
    }

    /// Drop the interface records of every vertex within the visibility
    /// radius of `state`.
    pub fn clear_interface_data(&mut self, state: Arc<O::State>) -> Result<usize> {
        let near = self.nearest_r(MAINTENANCE_SLOT, state, self.config.sparse_delta)?;
        let cleared: usize = near.iter().map(|n| self.interfaces.clear_vertex(n.vertex)).sum();
        trace!(vertices = near.len(), cleared, "clear_interface_data");
        Ok(cleared)
    }

    pub fn clear_interfaces_near_vertex(&mut self, v: VertexId) -> Result<usize> {
        let state = self.get_vertex_state(v)?;
        self.clear_interface_data(state)
    }

    /// `(states stored, missing crossings)` over all interface records.
    pub fn interface_storage_size(&self) -> (usize, usize) {
        self.interfaces.storage_size()
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// No two live vertices may hold equal states.
    pub fn check_duplicate_states(&self) -> Result<()> {
        let ids: Vec<VertexId> = self.vertex_ids().collect();
        for (i, &a) in ids.iter().enumerate() {
            let sa = &self.live_vertex(a)?.state;
            for &b in &ids[i + 1..] {
                if self.oracle.equal_states(sa, &self.live_vertex(b)?.state) {
                    return Err(Error::InvariantViolation(format!(
                        "vertices {a} and {b} hold equal states"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every live vertex must be able to find a representative for its own
    /// state.
    pub fn verify_representatives(&self) -> Result<()> {
        for v in self.vertex_ids() {
            let vertex = self.live_vertex(v)?;
            if self.sparse_representative(MAINTENANCE_SLOT, vertex.state.clone())?.is_none() {
                warn!(vertex = %v, "vertex has no representative");
                return Err(Error::MissingRepresentative(vertex.state_id));
            }
        }
        Ok(())
    }
}
