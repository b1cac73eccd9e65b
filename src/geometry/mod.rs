//! # Geometry Oracle
//!
//! The contract between the roadmap engine and whatever owns the
//! configuration space: distance, collision checking, sampling and
//! clearance. The engine never looks inside a state.
//!
//! ## Implementations
//!
//! | Oracle | Module | Description |
//! |--------|--------|-------------|
//! | `PlaneSpace` | `plane` | 2D reference space with rectangle/circle obstacles |
//!
//! The `cache` module holds the two stores that sit between the engine and
//! the oracle: `StateCache` (owns configurations by `StateId`) and
//! `MotionCache` (memoises motion checks between cached states).

pub mod cache;
pub mod plane;

pub use cache::{MotionCache, StateCache};
pub use plane::{Obstacle, PlaneSpace, Point2};

// ============================================================================
// GeometryOracle trait
// ============================================================================

/// Configuration space services consumed by the engine.
///
/// All methods take `&self`; an oracle may be queried from several worker
/// threads at once, so implementations keep any mutable state (RNG,
/// counters) behind their own locks.
pub trait GeometryOracle: Send + Sync + 'static {
    /// Opaque configuration type.
    type State: Clone + Send + Sync + std::fmt::Debug + 'static;

    /// Number of degrees of freedom.
    fn dimension(&self) -> usize;

    /// Longest possible distance between two states of the space.
    fn max_extent(&self) -> f64;

    /// Symmetric, non-negative, triangle-inequality-respecting metric.
    fn distance(&self, a: &Self::State, b: &Self::State) -> f64;

    /// Whether the straight-line motion from `a` to `b` is collision free.
    fn motion_valid(&self, a: &Self::State, b: &Self::State) -> bool;

    /// Whether `state` itself is collision free and within bounds.
    fn is_valid(&self, state: &Self::State) -> bool;

    /// Distance from `state` to the nearest obstacle.
    fn clearance(&self, state: &Self::State) -> f64;

    /// Draw one state near `anchor`, nominally within `radius`. Callers
    /// validate the result; no retry happens here.
    fn sample_near(&self, anchor: &Self::State, radius: f64) -> Self::State;

    /// Explicit copy used when a transient state becomes owned by a vertex.
    fn clone_state(&self, state: &Self::State) -> Self::State {
        state.clone()
    }

    fn equal_states(&self, a: &Self::State, b: &Self::State) -> bool {
        self.distance(a, b) < f64::EPSILON
    }
}
