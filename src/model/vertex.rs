//! Sparse vertex in the roadmap.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

use super::{EdgeId, StateId};

/// Opaque sparse vertex identifier. Stable for the lifetime of a
/// construction pass; slots of removed vertices are only recycled by
/// `SparseGraph::remove_deleted_vertices`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(pub u32);

impl VertexId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Reason a vertex was admitted into the sparse graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexType {
    /// No existing vertex could see the candidate.
    Coverage,
    /// The candidate joins two disconnected components.
    Connectivity,
    /// The candidate bridges its two nearest, unconnected neighbours.
    Interface,
    /// Inserted by spanner repair; never consolidated away.
    Quality,
    /// Forced insertion while seeding from a lattice.
    Discretized,
}

impl VertexType {
    pub const ALL: [VertexType; 5] = [
        VertexType::Coverage,
        VertexType::Connectivity,
        VertexType::Interface,
        VertexType::Quality,
        VertexType::Discretized,
    ];
}

/// Adjacency entry: the neighbour and the edge reaching it.
pub type Adjacency = SmallVec<[(VertexId, EdgeId); 8]>;

/// A live vertex record in the graph arena.
#[derive(Debug, Clone)]
pub struct SparseVertex<S> {
    pub id: VertexId,
    pub state_id: StateId,
    /// Shared handle into the state cache; the vertex co-owns it.
    pub state: Arc<S>,
    pub kind: VertexType,
    pub popularity: f64,
    pub(crate) adjacency: Adjacency,
}

impl<S> SparseVertex<S> {
    pub fn new(id: VertexId, state_id: StateId, state: Arc<S>, kind: VertexType) -> Self {
        Self {
            id,
            state_id,
            state,
            kind,
            popularity: 0.0,
            adjacency: SmallVec::new(),
        }
    }

    pub fn degree(&self) -> usize {
        self.adjacency.len()
    }

    pub fn neighbors(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.adjacency.iter().map(|(v, _)| *v)
    }

    /// Edge to `other`, if one exists.
    pub fn edge_to(&self, other: VertexId) -> Option<EdgeId> {
        self.adjacency
            .iter()
            .find(|(v, _)| *v == other)
            .map(|(_, e)| *e)
    }
}
