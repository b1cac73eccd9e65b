//! A* over the sparse graph.
//!
//! Edge cost is the stored edge weight, the heuristic is the geometric
//! distance to the goal. With popularity bias enabled edge weights may
//! drop below geometric distance, so the heuristic falls back to zero to
//! stay admissible. Edges known to be in collision are skipped.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::{debug, trace};

use crate::geometry::GeometryOracle;
use crate::model::{EdgeCollisionState, SearchOutcome, VertexId, VertexPath};
use crate::Result;
use super::SparseGraph;

#[derive(Debug, Clone, Copy)]
struct AStarNode {
    vertex: VertexId,
    g_cost: f64,
    f_cost: f64,
}

impl Eq for AStarNode {}

impl PartialEq for AStarNode {
    fn eq(&self, other: &Self) -> bool {
        self.vertex == other.vertex && self.f_cost == other.f_cost
    }
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; ties go to the lower vertex id
        other
            .f_cost
            .total_cmp(&self.f_cost)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<O: GeometryOracle> SparseGraph<O> {
    fn astar_heuristic(&self, v: VertexId, goal: VertexId) -> Result<f64> {
        if self.config.popularity_bias_enabled {
            return Ok(0.0);
        }
        self.distance(v, goal)
    }

    /// Shortest path from `start` to `goal`. The goal test runs when a
    /// vertex is popped from the frontier.
    pub fn astar_search(&self, start: VertexId, goal: VertexId) -> Result<SearchOutcome> {
        self.live_vertex(start)?;
        self.live_vertex(goal)?;

        let slots = self.vertices.len();
        let mut g_score = vec![f64::INFINITY; slots];
        let mut came_from: Vec<Option<VertexId>> = vec![None; slots];
        let mut closed = vec![false; slots];
        let mut open = BinaryHeap::new();
        let mut expanded = 0usize;

        g_score[start.index()] = 0.0;
        open.push(AStarNode {
            vertex: start,
            g_cost: 0.0,
            f_cost: self.astar_heuristic(start, goal)?,
        });

        while let Some(current) = open.pop() {
            let v = current.vertex;
            if closed[v.index()] {
                continue;
            }
            closed[v.index()] = true;
            expanded += 1;

            if v == goal {
                let mut vertices = vec![goal];
                let mut cursor = goal;
                while let Some(prev) = came_from[cursor.index()] {
                    vertices.push(prev);
                    cursor = prev;
                }
                vertices.reverse();
                debug!(start = %start, goal = %goal, hops = vertices.len() - 1,
                       distance = current.g_cost, expanded, "astar found path");
                return Ok(SearchOutcome::Found(VertexPath {
                    vertices,
                    distance: current.g_cost,
                }));
            }

            let Some(vertex) = self.vertex(v) else { continue };
            for &(n, e) in vertex.adjacency.iter() {
                if closed[n.index()] {
                    continue;
                }
                let Some(edge) = self.edge(e) else { continue };
                if edge.collision == EdgeCollisionState::InCollision {
                    trace!(edge = %e, "astar skips edge in collision");
                    continue;
                }
                let tentative = current.g_cost + edge.weight;
                if tentative < g_score[n.index()] {
                    g_score[n.index()] = tentative;
                    came_from[n.index()] = Some(v);
                    open.push(AStarNode {
                        vertex: n,
                        g_cost: tentative,
                        f_cost: tentative + self.astar_heuristic(n, goal)?,
                    });
                }
            }
        }

        debug!(start = %start, goal = %goal, expanded, "astar exhausted frontier");
        Ok(SearchOutcome::Exhausted { expanded })
    }
}
