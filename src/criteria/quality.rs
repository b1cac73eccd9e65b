//! Quality test: interface bookkeeping, spanner check and repair.
//!
//! A candidate `q` with representative `v` is tested against a few states
//! sampled within the dense radius. Every sample represented by another
//! vertex `v'` is a crossing between the regions of `v` and `v'`, and is
//! recorded on both sides. The spanner check then compares, for each pair
//! of neighbours around a vertex, the recorded gap against the detour the
//! graph currently offers, and repairs the pair when the detour is too long.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::geometry::GeometryOracle;
use crate::graph::smoothing;
use crate::interface::{Crossing, Slot, VertexPair};
use crate::model::{EdgeType, StateId, VertexId, VertexType};
use crate::{Error, Result};
use super::{Neighborhood, SparseCriteria};

impl<O: GeometryOracle> SparseCriteria<O> {
    pub(crate) fn check_add_quality(
        &mut self,
        candidate: StateId,
        hood: &Neighborhood,
        thread_id: usize,
    ) -> Result<bool> {
        let Some(&candidate_rep) = hood.visible.first() else {
            return Ok(false);
        };
        let candidate_state = self.graph.states().get(candidate)?;

        let close = self.find_close_representatives(&candidate_state, candidate_rep, thread_id)?;
        trace!(candidate = %candidate, rep = %candidate_rep, close = close.len(), "close representatives");

        let mut updated = false;
        for (&rep, sample) in &close {
            updated |= self.update_pair_points(candidate_rep, &candidate_state, rep, sample)?;
            updated |= self.update_pair_points(rep, sample, candidate_rep, &candidate_state)?;
        }
        if !updated {
            return Ok(false);
        }

        let mut added = self.spanner_check(candidate_rep)?;
        for &rep in close.keys() {
            if self.spanner_check(rep)? {
                added = true;
            }
        }
        Ok(added)
    }

    /// Draw one state within the dense radius of `anchor` that is valid and
    /// reachable from it, or give up after the configured attempts.
    fn sample_near_valid(&self, anchor: &O::State) -> Option<O::State> {
        let oracle = self.graph.oracle();
        let radius = self.config.dense_delta;
        (0..self.config.max_sample_attempts).find_map(|_| {
            let s = oracle.sample_near(anchor, radius);
            (oracle.is_valid(&s)
                && oracle.distance(anchor, &s) <= radius
                && oracle.motion_valid(anchor, &s))
            .then_some(s)
        })
    }

    /// Sample around the candidate and collect, per distinct representative
    /// other than `candidate_rep`, the first sample it represents. A sample
    /// that nobody represents is admitted for coverage and ends the search
    /// with nothing collected.
    fn find_close_representatives(
        &mut self,
        candidate_state: &Arc<O::State>,
        candidate_rep: VertexId,
        thread_id: usize,
    ) -> Result<BTreeMap<VertexId, Arc<O::State>>> {
        let mut close = BTreeMap::new();

        for i in 0..self.config.near_sample_points {
            let Some(sample) = self.sample_near_valid(candidate_state) else {
                warn!(sample = i, attempts = self.config.max_sample_attempts, "no valid nearby sample, skipping");
                continue;
            };
            let sample = Arc::new(sample);

            match self.graph.sparse_representative(thread_id, sample.clone())? {
                None => {
                    if self.sufficient_clearance(&sample) {
                        let v = self.admit_owned_vertex(&sample, VertexType::Coverage)?;
                        debug!(vertex = %v, "unrepresented sample admitted for coverage");
                    }
                    close.clear();
                    break;
                }
                Some(rep) if rep != candidate_rep => {
                    close.entry(rep).or_insert(sample);
                }
                Some(_) => {}
            }
        }
        Ok(close)
    }

    /// Record the crossing `(q at v, q' at v')` against every neighbour `v''`
    /// of `v` that shares no edge with `v'`.
    pub fn update_pair_points(
        &mut self,
        v: VertexId,
        q: &Arc<O::State>,
        vp: VertexId,
        qp: &Arc<O::State>,
    ) -> Result<bool> {
        self.graph.live_vertex(v)?;
        let mut updated = false;
        for vpp in self.graph.adjacent_unconnected(v, vp) {
            if self.distance_check(v, q, vp, qp, vpp) {
                updated = true;
            }
        }
        Ok(updated)
    }

    /// Offer one crossing to the record of `v` for the pair `(vp, vpp)`.
    pub fn distance_check(
        &mut self,
        v: VertexId,
        q: &Arc<O::State>,
        vp: VertexId,
        qp: &Arc<O::State>,
        vpp: VertexId,
    ) -> bool {
        let changed = self.graph.record_crossing(v, vp, vpp, q.clone(), qp.clone());
        trace!(owner = %v, toward = %vp, other = %vpp, changed, "distance_check");
        changed
    }

    /// Longest midpoint detour from `vp` to `vpp` (or to a vertex `x` next
    /// to `vpp` that also borders `v`) through `v`.
    pub fn max_spanner_path(&self, v: VertexId, vp: VertexId, vpp: VertexId) -> Result<f64> {
        let mut qualified: Vec<VertexId> = self
            .graph
            .neighbors(vpp)
            .into_iter()
            .filter(|&x| self.graph.has_edge(x, v) && !self.graph.has_edge(x, vp))
            .filter(|&x| {
                self.graph
                    .interfaces()
                    .get(v, VertexPair::new(vpp, x))
                    .is_some_and(|d| d.has(Slot::toward(vpp, x)))
            })
            .collect();
        qualified.push(vpp);

        let leg = self.graph.distance(vp, v)?;
        let mut max = 0.0_f64;
        for x in qualified {
            max = max.max((leg + self.graph.distance(v, x)?) / 2.0);
        }
        Ok(max)
    }

    /// Look for spanner violations around `v` and repair them. At most one
    /// triple is repaired per neighbour `v'`. Returns whether anything was
    /// added.
    pub fn spanner_check(&mut self, v: VertexId) -> Result<bool> {
        if !self.graph.is_live(v) {
            warn!(vertex = %v, "spanner check on removed vertex");
            return Ok(false);
        }

        let mut violated = false;
        for vp in self.graph.neighbors(v) {
            if !self.graph.is_live(v) {
                break;
            }
            if !self.graph.is_live(vp) {
                continue;
            }
            for vpp in self.graph.adjacent_unconnected(v, vp) {
                if !self.graph.is_live(vpp) || self.graph.has_edge(vp, vpp) {
                    continue;
                }
                let Some(last_distance) = self
                    .graph
                    .interfaces()
                    .get(v, VertexPair::new(vp, vpp))
                    .map(|d| d.last_distance())
                else {
                    continue;
                };

                let midpoint = self.max_spanner_path(v, vp, vpp)?;
                if self.config.stretch_factor * last_distance >= midpoint {
                    continue;
                }
                debug!(v = %v, vp = %vp, vpp = %vpp, midpoint, last_distance,
                       stretch = self.config.stretch_factor, "spanner property violated");

                if self.add_quality_path(v, vp, vpp)? {
                    violated = true;
                    break;
                }
            }
        }
        Ok(violated)
    }

    /// Connect `vp` and `vpp` directly, or through a shortcut of the path
    /// through both recorded crossings around `v`.
    pub fn add_quality_path(&mut self, v: VertexId, vp: VertexId, vpp: VertexId) -> Result<bool> {
        if self.graph.motion_between(vp, vpp)? {
            self.admit_edge(vp, vpp, EdgeType::Quality)?;
            debug!(vp = %vp, vpp = %vpp, "quality edge added directly");
            return Ok(true);
        }

        let (first, second) = {
            let data = self
                .graph
                .interfaces()
                .get(v, VertexPair::new(vp, vpp))
                .ok_or_else(|| Error::InvariantViolation(format!("no interface record on {v} for {vp}-{vpp}")))?;
            match (data.interface1(), data.interface2()) {
                (Some(a), Some(b)) => (a.clone(), b.clone()),
                _ => {
                    return Err(Error::InvariantViolation(format!(
                        "incomplete interface record on {v} for {vp}-{vpp}"
                    )));
                }
            }
        };

        // Slot 1 faces the smaller id
        let (near, far): (Crossing<O::State>, Crossing<O::State>) =
            if vp < vpp { (first, second) } else { (second, first) };
        let v_state = self.graph.get_vertex_state(v)?;
        let raw = [
            self.graph.get_vertex_state(vp)?,
            near.outside,
            near.inside,
            v_state.clone(),
            far.inside,
            far.outside,
            self.graph.get_vertex_state(vpp)?,
        ];

        let oracle = self.graph.oracle().clone();
        let path = smoothing::shortcut(&raw, |a, b| oracle.motion_valid(a, b));
        trace!(raw = raw.len(), shortcut = path.len(), "quality path shortcut");
        if path.len() < 3 {
            debug!(vp = %vp, vpp = %vpp, "shortcut path lost its interior");
            return Ok(false);
        }

        let interior = &path[1..path.len() - 1];
        if interior
            .iter()
            .any(|s| oracle.distance(&v_state, s) < self.config.dense_delta)
        {
            debug!(v = %v, "quality path state too close to v, abandoning repair");
            return Ok(false);
        }

        let mut prior = vp;
        let mut chain = true;
        for state in interior {
            if !self.sufficient_clearance(state) {
                warn!("quality path state lacks clearance, chain edges disabled");
                chain = false;
                continue;
            }
            let nv = self.admit_owned_vertex(state, VertexType::Quality)?;
            if self.check_remove_close_vertices(nv)? {
                self.graph.clear_interfaces_near_vertex(nv)?;
                return Ok(true);
            }
            self.graph.clear_interfaces_near_vertex(nv)?;
            if chain {
                self.admit_edge(prior, nv, EdgeType::Quality)?;
                prior = nv;
            }
        }
        if chain {
            self.admit_edge(prior, vpp, EdgeType::Quality)?;
        }
        debug!(v = %v, vp = %vp, vpp = %vpp, "quality path inserted");
        Ok(true)
    }
}
