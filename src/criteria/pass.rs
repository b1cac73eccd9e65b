//! Construction pass driver and statistics.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::geometry::GeometryOracle;
use crate::model::{EdgeType, StateId, VertexType};
use crate::{Error, Result};
use super::SparseCriteria;

// ============================================================================
// Statistics
// ============================================================================

/// Counters accumulated across admissions until cleared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstructionStats {
    pub coverage: usize,
    pub connectivity: usize,
    pub interface: usize,
    pub quality: usize,
    pub discretized: usize,
    /// Vertices absorbed by close-vertex consolidation.
    pub vertices_moved: usize,
    /// Candidates of a sampling pass that changed the graph.
    pub random_samples_added: usize,
    /// Edges added by admissions, per edge type. Re-wired edges are not counted.
    pub connectivity_edges: usize,
    pub interface_edges: usize,
    pub quality_edges: usize,
}

impl ConstructionStats {
    pub fn record(&mut self, kind: VertexType) {
        *self.counter(kind) += 1;
    }

    fn counter(&mut self, kind: VertexType) -> &mut usize {
        match kind {
            VertexType::Coverage => &mut self.coverage,
            VertexType::Connectivity => &mut self.connectivity,
            VertexType::Interface => &mut self.interface,
            VertexType::Quality => &mut self.quality,
            VertexType::Discretized => &mut self.discretized,
        }
    }

    /// Vertices added for `kind`.
    pub fn added(&self, kind: VertexType) -> usize {
        match kind {
            VertexType::Coverage => self.coverage,
            VertexType::Connectivity => self.connectivity,
            VertexType::Interface => self.interface,
            VertexType::Quality => self.quality,
            VertexType::Discretized => self.discretized,
        }
    }

    pub fn total_added(&self) -> usize {
        VertexType::ALL.iter().map(|k| self.added(*k)).sum()
    }

    pub fn record_edge(&mut self, kind: EdgeType) {
        match kind {
            EdgeType::Connectivity => self.connectivity_edges += 1,
            EdgeType::Interface => self.interface_edges += 1,
            EdgeType::Quality => self.quality_edges += 1,
        }
    }

    /// Edges added for `kind`.
    pub fn edges_added(&self, kind: EdgeType) -> usize {
        match kind {
            EdgeType::Connectivity => self.connectivity_edges,
            EdgeType::Interface => self.interface_edges,
            EdgeType::Quality => self.quality_edges,
        }
    }
}

/// What the driver should do after a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStep {
    Continue,
    /// Quality mode saturated: too many consecutive rejections.
    Saturated,
}

/// Summary of one construction pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub candidates: usize,
    pub admitted: usize,
    pub saturated: bool,
    pub quality_mode: bool,
    pub vertices: usize,
    pub edges: usize,
    pub disjoint_sets: usize,
    pub vertices_freed: usize,
    pub stats: ConstructionStats,
    pub motion_checks: u64,
    pub motion_percent_cached: f64,
    pub interface_states_stored: usize,
    pub interface_missing: usize,
}

// ============================================================================
// Pass driver
// ============================================================================

impl<O: GeometryOracle> SparseCriteria<O> {
    /// Update the quality-mode switch and the termination test after one
    /// candidate has been processed.
    pub fn after_candidate(&mut self) -> PassStep {
        if !self.use_fourth_criteria
            && self.consecutive_failures >= self.config.fourth_criteria_after_failures
        {
            info!(failures = self.consecutive_failures, "switching on quality criterion");
            self.use_fourth_criteria = true;
            self.consecutive_failures = 0;
        }
        if self.use_fourth_criteria && self.consecutive_failures > self.config.terminate_after_failures {
            info!(failures = self.consecutive_failures, "construction saturated");
            return PassStep::Saturated;
        }
        PassStep::Continue
    }

    /// Admit a candidate from a sampling pass and update the pass counters.
    pub fn add_sample(&mut self, candidate: StateId, thread_id: usize) -> Result<PassStep> {
        if self.add_state_to_roadmap(candidate, thread_id)?.is_admitted() {
            self.stats.random_samples_added += 1;
        } else if self.consecutive_failures % 1000 == 0 {
            info!(failures = self.consecutive_failures, "sample rejected");
        }
        Ok(self.after_candidate())
    }

    /// Feed candidates until they run out or quality mode saturates, then
    /// release slots of vertices removed along the way. Each pass starts
    /// with quality mode off and a zero failure count.
    pub fn run_pass<I>(&mut self, candidates: I) -> Result<PassReport>
    where
        I: IntoIterator<Item = StateId>,
    {
        self.begin_pass();
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut processed = 0;
        let mut admitted = 0;
        let mut saturated = false;

        for candidate in candidates {
            processed += 1;
            let before = self.stats.random_samples_added;
            let step = self.add_sample(candidate, 0)?;
            if self.stats.random_samples_added > before {
                admitted += 1;
            }
            if step == PassStep::Saturated {
                saturated = true;
                break;
            }
        }

        self.finish_pass(started_at, clock, processed, admitted, saturated)
    }

    /// Seed an empty graph from lattice states: every candidate that no
    /// criterion admits is forced in as `Discretized`. One sweep.
    pub fn insert_discretized<I>(&mut self, candidates: I) -> Result<PassReport>
    where
        I: IntoIterator<Item = StateId>,
    {
        if !self.graph.is_empty() {
            return Err(Error::InvariantViolation(
                "discretized seeding requires an empty graph".into(),
            ));
        }
        self.begin_pass();
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut processed = 0;
        let mut admitted = 0;

        self.discretized_insertion = true;
        let outcome = candidates.into_iter().try_for_each(|candidate| {
            processed += 1;
            if self.add_state_to_roadmap(candidate, 0)?.is_admitted() {
                admitted += 1;
            }
            Ok::<(), Error>(())
        });
        self.discretized_insertion = false;
        outcome?;

        self.finish_pass(started_at, clock, processed, admitted, false)
    }

    fn begin_pass(&mut self) {
        self.consecutive_failures = 0;
        self.use_fourth_criteria = false;
        self.stats.vertices_moved = 0;
    }

    fn finish_pass(
        &mut self,
        started_at: DateTime<Utc>,
        clock: Instant,
        candidates: usize,
        admitted: usize,
        saturated: bool,
    ) -> Result<PassReport> {
        let vertices_freed = self.graph.remove_deleted_vertices();

        if self.config.verify_invariants {
            self.graph.check_connected_components()?;
            self.graph.check_duplicate_states()?;
            self.graph.verify_representatives()?;
        }

        let (interface_states_stored, interface_missing) = self.graph.interface_storage_size();
        let motions = self.graph.motions();
        let report = PassReport {
            started_at,
            duration_secs: clock.elapsed().as_secs_f64(),
            candidates,
            admitted,
            saturated,
            quality_mode: self.use_fourth_criteria,
            vertices: self.graph.num_vertices(),
            edges: self.graph.num_edges(),
            disjoint_sets: self.graph.get_disjoint_sets_count(),
            vertices_freed,
            stats: self.stats.clone(),
            motion_checks: motions.total_checks(),
            motion_percent_cached: motions.percent_cached(),
            interface_states_stored,
            interface_missing,
        };

        if candidates > 0 && admitted == 0 {
            warn!(candidates, "pass admitted nothing");
        }
        info!(
            candidates,
            admitted,
            saturated,
            vertices = report.vertices,
            edges = report.edges,
            disjoint_sets = report.disjoint_sets,
            moved = report.stats.vertices_moved,
            "construction pass finished"
        );
        Ok(report)
    }
}
