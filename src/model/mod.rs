//! # Roadmap Model
//!
//! Plain DTOs shared by every layer: identifiers, vertex and edge records,
//! vertex paths. No geometry, no locking, no I/O.

pub mod vertex;
pub mod edge;
pub mod path;

pub use vertex::{Adjacency, SparseVertex, VertexId, VertexType};
pub use edge::{EdgeCollisionState, EdgeId, EdgeType, SparseEdge};
pub use path::{SearchOutcome, VertexPath};

use serde::{Deserialize, Serialize};

/// Opaque identifier of a configuration held by the state cache.
/// `StateId(0)` is reserved as the null state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateId(pub u64);

impl StateId {
    pub const NULL: StateId = StateId(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}
