//! # spars-rs: Sparse Roadmap Spanner
//!
//! Incremental construction and quality maintenance of a sparse roadmap: a
//! small graph of configurations whose shortest paths stay within a bounded
//! stretch of the paths a much denser sampling would offer.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GeometryOracle` is the contract between the engine and the configuration space
//! 2. **Clean DTOs**: `VertexId`, `SparseVertex`, `SparseEdge`, `VertexPath` cross all boundaries
//! 3. **Single writer**: every graph mutation goes through one write lock
//! 4. **Arena storage**: vertices and edges live in id-indexed slots, removal tombstones
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spars_rs::{Roadmap, SparseConfig};
//! use spars_rs::geometry::{Obstacle, PlaneSpace};
//!
//! # fn example() -> spars_rs::Result<()> {
//! let space = PlaneSpace::new(10.0, 10.0, 7)
//!     .with_obstacle(Obstacle::rect(4.0, 2.0, 6.0, 8.0));
//! let lattice = space.lattice(1.0);
//! let roadmap = Roadmap::new(space, SparseConfig::default())?;
//!
//! roadmap.insert_discretized(lattice)?;
//! let report = roadmap.run_pass(std::iter::repeat_with(|| {
//!     roadmap.oracle().sample_valid(100)
//! }).map_while(|s| s).take(5_000))?;
//! println!("{} vertices in {} components", report.vertices, report.disjoint_sets);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Role |
//! |--------|------|
//! | `model` | identifiers, vertex/edge records, paths |
//! | `geometry` | oracle trait, state and motion caches, 2D reference space |
//! | `index` | nearest-neighbour lookups with per-thread query slots |
//! | `interface` | closest observed crossings between neighbouring regions |
//! | `graph` | arena graph, disjoint sets, A*, path shortcutting |
//! | `criteria` | admission tests, spanner repair, consolidation, pass driver |
//! | `config` | knobs and derived parameters |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod geometry;
pub mod index;
pub mod interface;
pub mod graph;
pub mod criteria;
pub mod config;

// ============================================================================
// Re-exports
// ============================================================================

pub use model::{
    EdgeCollisionState, EdgeId, EdgeType, SearchOutcome, SparseEdge, SparseVertex,
    StateId, VertexId, VertexPath, VertexType,
};
pub use geometry::{GeometryOracle, MotionCache, StateCache};
pub use graph::SparseGraph;
pub use criteria::{Admission, ConstructionStats, PassReport, SparseCriteria};
pub use config::{ResolvedConfig, SparseConfig};

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

// ============================================================================
// Top-level Roadmap handle
// ============================================================================

/// The primary entry point. A `Roadmap` bundles the oracle, the shared
/// caches and the admission engine behind a single writer lock.
pub struct Roadmap<O: GeometryOracle> {
    oracle: Arc<O>,
    states: Arc<StateCache<O::State>>,
    motions: Arc<MotionCache>,
    core: RwLock<SparseCriteria<O>>,
}

impl<O: GeometryOracle> Roadmap<O> {
    /// Create an empty roadmap over `oracle`.
    pub fn new(oracle: O, config: SparseConfig) -> Result<Self> {
        let resolved = config.resolve(oracle.max_extent(), oracle.dimension())?;
        info!(
            sparse_delta = resolved.sparse_delta,
            dense_delta = resolved.dense_delta,
            stretch_factor = resolved.stretch_factor,
            near_sample_points = resolved.near_sample_points,
            "roadmap configured"
        );

        let oracle = Arc::new(oracle);
        let states = Arc::new(StateCache::new());
        let motions = Arc::new(MotionCache::new());
        let graph = SparseGraph::new(oracle.clone(), states.clone(), motions.clone(), resolved);
        Ok(Self {
            oracle,
            states,
            motions,
            core: RwLock::new(SparseCriteria::new(graph)),
        })
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn states(&self) -> &StateCache<O::State> {
        &self.states
    }

    pub fn motions(&self) -> &MotionCache {
        &self.motions
    }

    /// Move a state into the state cache.
    pub fn add_state(&self, state: O::State) -> StateId {
        self.states.insert(state)
    }

    /// Offer a cached state to the admission tests.
    pub fn add_state_to_roadmap(&self, state_id: StateId, thread_id: usize) -> Result<Admission> {
        self.core.write().add_state_to_roadmap(state_id, thread_id)
    }

    /// Cache and offer states until they run out or construction saturates.
    pub fn run_pass<I>(&self, states: I) -> Result<PassReport>
    where
        I: IntoIterator<Item = O::State>,
    {
        let cache = &self.states;
        let ids = states.into_iter().map(|s| cache.insert(s));
        self.core.write().run_pass(ids)
    }

    /// Seed an empty roadmap from lattice states.
    pub fn insert_discretized<I>(&self, states: I) -> Result<PassReport>
    where
        I: IntoIterator<Item = O::State>,
    {
        let cache = &self.states;
        let ids = states.into_iter().map(|s| cache.insert(s));
        self.core.write().insert_discretized(ids)
    }

    pub fn astar_search(&self, start: VertexId, goal: VertexId) -> Result<SearchOutcome> {
        self.core.read().graph().astar_search(start, goal)
    }

    pub fn same_component(&self, a: VertexId, b: VertexId) -> bool {
        self.core.read().graph().same_component(a, b)
    }

    pub fn get_vertex_state(&self, v: VertexId) -> Result<Arc<O::State>> {
        self.core.read().graph().get_vertex_state(v)
    }

    pub fn get_disjoint_sets_count(&self) -> usize {
        self.core.read().graph().get_disjoint_sets_count()
    }

    pub fn num_vertices(&self) -> usize {
        self.core.read().graph().num_vertices()
    }

    pub fn num_edges(&self) -> usize {
        self.core.read().graph().num_edges()
    }

    /// Shared access to the engine (for advanced use).
    pub fn read(&self) -> RwLockReadGuard<'_, SparseCriteria<O>> {
        self.core.read()
    }

    /// Exclusive access to the engine (for advanced use).
    pub fn write(&self) -> RwLockWriteGuard<'_, SparseCriteria<O>> {
        self.core.write()
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Duplicate edge between {a} and {b}")]
    DuplicateEdge { a: VertexId, b: VertexId },

    #[error("Self loop on {0}")]
    SelfLoop(VertexId),

    #[error("Vertex not found: {0}")]
    VertexNotFound(VertexId),

    #[error("State not found: {0}")]
    StateNotFound(StateId),

    #[error("No representative for admitted state {0}")]
    MissingRepresentative(StateId),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Interface record on {owner} still references removed vertex {removed}")]
    DanglingInterface { owner: VertexId, removed: VertexId },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
