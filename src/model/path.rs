//! Vertex paths through the sparse graph and search outcomes.

use serde::{Deserialize, Serialize};

use super::VertexId;

/// A path in the sparse graph: v0 - v1 - ... - vn, with its summed weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexPath {
    /// Vertices along the path. Never empty.
    pub vertices: Vec<VertexId>,
    pub distance: f64,
}

impl VertexPath {
    pub fn single(v: VertexId) -> Self {
        Self { vertices: vec![v], distance: 0.0 }
    }

    /// Number of edges on the path.
    pub fn len(&self) -> usize {
        self.vertices.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn start(&self) -> VertexId {
        self.vertices[0]
    }

    pub fn end(&self) -> VertexId {
        self.vertices[self.vertices.len() - 1]
    }

    /// Consecutive vertex pairs, one per edge.
    pub fn segments(&self) -> impl Iterator<Item = (VertexId, VertexId)> + '_ {
        self.vertices.windows(2).map(|w| (w[0], w[1]))
    }
}

/// Result of a shortest-path search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(VertexPath),
    /// The frontier emptied before reaching the goal.
    Exhausted { expanded: usize },
}

impl SearchOutcome {
    pub fn path(&self) -> Option<&VertexPath> {
        match self {
            SearchOutcome::Found(p) => Some(p),
            SearchOutcome::Exhausted { .. } => None,
        }
    }

    pub fn into_path(self) -> Option<VertexPath> {
        match self {
            SearchOutcome::Found(p) => Some(p),
            SearchOutcome::Exhausted { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found(_))
    }
}
