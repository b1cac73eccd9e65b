//! Sparse edge (undirected local connection) in the roadmap.

use serde::{Deserialize, Serialize};

use super::VertexId;

/// Opaque edge identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl EdgeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Reason an edge was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Connectivity,
    Interface,
    Quality,
}

/// Lazily evaluated collision state. Once FREE or IN_COLLISION it is
/// never recomputed until explicitly cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EdgeCollisionState {
    #[default]
    NotChecked,
    Free,
    InCollision,
}

/// An edge record in the graph arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseEdge {
    pub id: EdgeId,
    pub a: VertexId,
    pub b: VertexId,
    pub weight: f64,
    pub kind: EdgeType,
    pub collision: EdgeCollisionState,
}

impl SparseEdge {
    pub fn new(id: EdgeId, a: VertexId, b: VertexId, weight: f64, kind: EdgeType) -> Self {
        Self {
            id,
            a,
            b,
            weight,
            kind,
            collision: EdgeCollisionState::NotChecked,
        }
    }

    /// The "other" end of the edge from the given vertex.
    pub fn other(&self, from: VertexId) -> Option<VertexId> {
        if from == self.a { Some(self.b) }
        else if from == self.b { Some(self.a) }
        else { None }
    }

    pub fn connects(&self, x: VertexId, y: VertexId) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}
