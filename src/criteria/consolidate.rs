//! Close-vertex consolidation.

use tracing::{debug, trace};

use crate::geometry::GeometryOracle;
use crate::graph::MAINTENANCE_SLOT;
use crate::model::{EdgeType, VertexId, VertexType};
use crate::Result;
use super::SparseCriteria;

impl<O: GeometryOracle> SparseCriteria<O> {
    /// Let the fresh vertex `v1` absorb its nearest neighbour `v2` when `v2`
    /// is close, reachable, not a quality vertex, and every neighbour of
    /// `v2` can be re-attached to `v1`. Returns whether `v2` was removed.
    pub fn check_remove_close_vertices(&mut self, v1: VertexId) -> Result<bool> {
        if !self.config.use_check_remove_close_vertices {
            return Ok(false);
        }

        let s1 = self.graph.get_vertex_state(v1)?;
        let Some(v2) = self
            .graph
            .nearest_k(MAINTENANCE_SLOT, s1.clone(), 2)?
            .into_iter()
            .map(|n| n.vertex)
            .find(|&n| n != v1)
        else {
            return Ok(false);
        };

        if self.graph.vertex_type(v2)? == VertexType::Quality {
            trace!(v1 = %v1, v2 = %v2, "nearest is a quality vertex, not merging");
            return Ok(false);
        }
        if self.graph.distance(v1, v2)? > self.config.close_vertex_radius() {
            return Ok(false);
        }
        if !self.graph.motion_between(v1, v2)? {
            trace!(v1 = %v1, v2 = %v2, "nearest not reachable, not merging");
            return Ok(false);
        }

        let mut rewire: Vec<(VertexId, EdgeType)> = Vec::new();
        for v3 in self.graph.neighbors(v2) {
            if v3 == v1 {
                continue;
            }
            if self.graph.distance(v1, v3)? > self.config.sparse_delta
                || !self.graph.motion_between(v1, v3)?
            {
                trace!(v1 = %v1, v3 = %v3, "neighbour cannot be re-attached, not merging");
                return Ok(false);
            }
            let kind = self
                .graph
                .edge_between(v2, v3)
                .map(|e| self.graph.edge_type(e))
                .transpose()?
                .unwrap_or(EdgeType::Interface);
            rewire.push((v3, kind));
        }

        let s2 = self.graph.get_vertex_state(v2)?;
        self.graph.clear_interface_data(s2)?;
        self.graph.interfaces_mut().purge_references(v2);

        for (v3, kind) in rewire {
            if !self.graph.has_edge(v1, v3) {
                self.graph.add_edge(v1, v3, kind)?;
            }
        }
        self.graph.remove_vertex(v2)?;
        self.stats.vertices_moved += 1;

        debug!(kept = %v1, removed = %v2, "merged close vertex");
        Ok(true)
    }
}
