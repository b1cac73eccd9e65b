//! # Admission Criteria
//!
//! Decides whether a candidate state earns a place in the sparse graph.
//! Tests run in a fixed order and the first one that applies wins:
//!
//! | Order | Test | Admits as |
//! |-------|------|-----------|
//! | 1 | nothing visible within the visibility radius | `Coverage` |
//! | 2 | visible neighbours lie in different components | `Connectivity` |
//! | 3 | two nearest neighbours visible but unconnected | `Interface` (or a direct edge) |
//! | 4 | spanner check after interface bookkeeping (quality mode only) | `Quality` |
//! | 5 | forced insertion while seeding from a lattice | `Discretized` |
//!
//! Anything else is a rejection and feeds the consecutive-failure counter
//! that switches quality mode on and eventually ends a pass.

mod consolidate;
mod pass;
mod quality;

pub use pass::{ConstructionStats, PassReport, PassStep};

use std::collections::BTreeSet;

use tracing::{debug, trace, warn};

use crate::config::ResolvedConfig;
use crate::geometry::GeometryOracle;
use crate::graph::SparseGraph;
use crate::model::{EdgeId, EdgeType, StateId, VertexId, VertexType};
use crate::Result;

// ============================================================================
// Admission outcome
// ============================================================================

/// Result of offering one candidate to the roadmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Rejected,
    /// The graph changed. `vertex` is the candidate's own vertex when one
    /// was created for it.
    Admitted {
        kind: VertexType,
        vertex: Option<VertexId>,
    },
}

impl Admission {
    fn admitted(kind: VertexType, vertex: Option<VertexId>) -> Self {
        Admission::Admitted { kind, vertex }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }

    pub fn kind(&self) -> Option<VertexType> {
        match self {
            Admission::Admitted { kind, .. } => Some(*kind),
            Admission::Rejected => None,
        }
    }

    pub fn vertex(&self) -> Option<VertexId> {
        match self {
            Admission::Admitted { vertex, .. } => *vertex,
            Admission::Rejected => None,
        }
    }
}

/// Sparse vertices around a candidate, nearest first.
#[derive(Debug, Clone, Default)]
pub(crate) struct Neighborhood {
    /// Everything within the visibility radius.
    pub graph: Vec<VertexId>,
    /// The subset the candidate can reach directly.
    pub visible: Vec<VertexId>,
}

// ============================================================================
// SparseCriteria
// ============================================================================

/// The admission engine. Owns the graph and every counter that steers a
/// construction pass.
pub struct SparseCriteria<O: GeometryOracle> {
    graph: SparseGraph<O>,
    config: ResolvedConfig,
    consecutive_failures: usize,
    use_fourth_criteria: bool,
    discretized_insertion: bool,
    stats: ConstructionStats,
}

impl<O: GeometryOracle> SparseCriteria<O> {
    pub fn new(graph: SparseGraph<O>) -> Self {
        let config = graph.config().clone();
        Self {
            graph,
            config,
            consecutive_failures: 0,
            use_fourth_criteria: false,
            discretized_insertion: false,
            stats: ConstructionStats::default(),
        }
    }

    pub fn graph(&self) -> &SparseGraph<O> {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SparseGraph<O> {
        &mut self.graph
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn stats(&self) -> &ConstructionStats {
        &self.stats
    }

    pub fn clear_statistics(&mut self) {
        self.stats = ConstructionStats::default();
        self.graph.motions().reset_counters();
    }

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures
    }

    /// Whether the quality test is currently switched on.
    pub fn quality_mode(&self) -> bool {
        self.use_fourth_criteria
    }

    /// Force the quality test on or off, resetting the failure counter.
    pub fn set_quality_mode(&mut self, enabled: bool) {
        self.use_fourth_criteria = enabled;
        self.consecutive_failures = 0;
    }

    fn admit_vertex(&mut self, state_id: StateId, kind: VertexType) -> Result<VertexId> {
        let v = self.graph.add_vertex(state_id, kind)?;
        self.stats.record(kind);
        Ok(v)
    }

    fn admit_owned_vertex(&mut self, state: &O::State, kind: VertexType) -> Result<VertexId> {
        let v = self.graph.add_vertex_from_state(state, kind)?;
        self.stats.record(kind);
        Ok(v)
    }

    fn admit_edge(&mut self, a: VertexId, b: VertexId, kind: EdgeType) -> Result<EdgeId> {
        let e = self.graph.add_edge(a, b, kind)?;
        self.stats.record_edge(kind);
        Ok(e)
    }

    fn sufficient_clearance(&self, state: &O::State) -> bool {
        self.graph.oracle().clearance(state) >= self.config.obstacle_clearance
    }

    // ========================================================================
    // Entry point
    // ========================================================================

    /// Run the admission tests for one cached candidate state.
    pub fn add_state_to_roadmap(&mut self, candidate: StateId, thread_id: usize) -> Result<Admission> {
        trace!(candidate = %candidate, thread_id, "add_state_to_roadmap");
        let hood = self.find_graph_neighbors(candidate, thread_id)?;

        let admission = if let Some(v) = self.check_add_coverage(candidate, &hood)? {
            Admission::admitted(VertexType::Coverage, Some(v))
        } else if let Some(v) = self.check_add_connectivity(candidate, &hood)? {
            Admission::admitted(VertexType::Connectivity, Some(v))
        } else if let Some(admission) = self.check_add_interface(candidate, &hood)? {
            admission
        } else if self.use_fourth_criteria && self.check_add_quality(candidate, &hood, thread_id)? {
            Admission::admitted(VertexType::Quality, None)
        } else if self.discretized_insertion {
            let v = self.admit_vertex(candidate, VertexType::Discretized)?;
            Admission::admitted(VertexType::Discretized, Some(v))
        } else {
            Admission::Rejected
        };

        match admission {
            Admission::Admitted { kind, vertex } => {
                debug!(candidate = %candidate, kind = ?kind, vertex = ?vertex, "candidate admitted");
                self.consecutive_failures = 0;
            }
            Admission::Rejected => {
                self.consecutive_failures += 1;
                trace!(candidate = %candidate, failures = self.consecutive_failures, "candidate rejected");
            }
        }
        Ok(admission)
    }

    /// Vertices within the visibility radius, and the visible subset.
    pub(crate) fn find_graph_neighbors(&self, candidate: StateId, thread_id: usize) -> Result<Neighborhood> {
        let state = self.graph.states().get(candidate)?;
        let near = self.graph.nearest_r(thread_id, state, self.config.sparse_delta)?;

        let mut hood = Neighborhood {
            graph: Vec::with_capacity(near.len()),
            visible: Vec::with_capacity(near.len()),
        };
        for n in near {
            hood.graph.push(n.vertex);
            let neighbor_state = self.graph.get_state_id(n.vertex)?;
            let visible = neighbor_state == candidate
                || self.graph.motions().check_motion(
                    &**self.graph.oracle(),
                    self.graph.states(),
                    candidate,
                    neighbor_state,
                )?;
            if visible {
                hood.visible.push(n.vertex);
            }
        }
        trace!(graph = hood.graph.len(), visible = hood.visible.len(), "find_graph_neighbors");
        Ok(hood)
    }

    // ========================================================================
    // Coverage
    // ========================================================================

    fn check_add_coverage(&mut self, candidate: StateId, hood: &Neighborhood) -> Result<Option<VertexId>> {
        if !hood.visible.is_empty() {
            return Ok(None);
        }
        // No edges: nothing around can see it
        let v = self.admit_vertex(candidate, VertexType::Coverage)?;
        debug!(vertex = %v, "coverage");
        Ok(Some(v))
    }

    // ========================================================================
    // Connectivity
    // ========================================================================

    fn check_add_connectivity(&mut self, candidate: StateId, hood: &Neighborhood) -> Result<Option<VertexId>> {
        let visible = &hood.visible;
        if visible.len() < 2 {
            return Ok(None);
        }

        let mut disconnected = BTreeSet::new();
        for (i, &a) in visible.iter().enumerate() {
            for &b in &visible[i + 1..] {
                if !self.graph.same_component(a, b) {
                    disconnected.insert(a);
                    disconnected.insert(b);
                }
            }
        }
        if disconnected.is_empty() {
            return Ok(None);
        }

        let v = self.admit_vertex(candidate, VertexType::Connectivity)?;
        self.check_remove_close_vertices(v)?;

        let new_state = self.graph.get_vertex_state(v)?;
        for x in disconnected {
            if !self.graph.is_live(x) {
                debug!(vertex = %x, "skip removed vertex");
                continue;
            }
            if self.graph.oracle().equal_states(&new_state, &*self.graph.get_vertex_state(x)?) {
                warn!(vertex = %x, new = %v, "skip vertex with the candidate's own state");
                continue;
            }
            if self.graph.has_edge(v, x) {
                continue;
            }
            // Earlier edges in this loop may already have merged the sets
            if !self.graph.same_component(v, x) {
                self.admit_edge(v, x, EdgeType::Connectivity)?;
            }
        }
        debug!(vertex = %v, "connectivity");
        Ok(Some(v))
    }

    // ========================================================================
    // Interface
    // ========================================================================

    fn check_add_interface(&mut self, candidate: StateId, hood: &Neighborhood) -> Result<Option<Admission>> {
        if hood.visible.len() < 2 {
            return Ok(None);
        }
        // Only when the two nearest are also the two nearest visible
        if hood.graph[0] != hood.visible[0] || hood.graph[1] != hood.visible[1] {
            return Ok(None);
        }
        let (a, b) = (hood.visible[0], hood.visible[1]);
        if self.graph.has_edge(a, b) {
            trace!(a = %a, b = %b, "nearest pair already connected");
            return Ok(None);
        }

        if self.graph.motion_between(a, b)? {
            self.admit_edge(a, b, EdgeType::Interface)?;
            let vertex = if self.discretized_insertion {
                Some(self.admit_vertex(candidate, VertexType::Discretized)?)
            } else {
                None
            };
            debug!(a = %a, b = %b, "interface: connected nearest pair directly");
            return Ok(Some(Admission::admitted(VertexType::Interface, vertex)));
        }

        let v = self.admit_vertex(candidate, VertexType::Interface)?;
        if self.check_remove_close_vertices(v)? {
            return Ok(Some(Admission::admitted(VertexType::Interface, Some(v))));
        }
        for end in [a, b] {
            if self.graph.is_live(end) {
                self.admit_edge(v, end, EdgeType::Interface)?;
            } else {
                warn!(vertex = %end, "interface end was removed, skipping edge");
            }
        }
        debug!(vertex = %v, a = %a, b = %b, "interface: bridged nearest pair");
        Ok(Some(Admission::admitted(VertexType::Interface, Some(v))))
    }
}
