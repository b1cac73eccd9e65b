//! Construction knobs.
//!
//! `SparseConfig` holds the raw, serialisable settings. Distances are
//! given as fractions of the space's maximum extent so one file works for
//! spaces of any size; `resolve` turns them into absolute values once the
//! oracle is known.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Raw construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseConfig {
    /// Visibility radius as a fraction of the maximum extent.
    /// Default: 0.1
    pub sparse_delta_fraction: f64,

    /// Interface sampling radius as a fraction of the maximum extent.
    /// Default: 0.001
    pub dense_delta_fraction: f64,

    /// Quality-test samples per degree of freedom.
    /// Default: 2
    pub near_sample_points_multiple: usize,

    /// Spanner stretch bound. Zero selects the bound derived from the
    /// lattice discretization.
    /// Default: 0.0
    pub stretch_factor: f64,

    /// How far lattice cells are pulled inside the visibility radius.
    /// Default: 0.001
    pub discretize_penetration_dist: f64,

    /// Minimum obstacle clearance for vertices created from samples.
    /// Default: 0.0
    pub obstacle_clearance: f64,

    /// Consecutive rejections before the quality test is switched on.
    /// Default: 500
    pub fourth_criteria_after_failures: usize,

    /// Consecutive rejections, in quality mode, that end a pass.
    /// Default: 1000
    pub terminate_after_failures: usize,

    /// Attempts per quality-test sample before the sample is skipped.
    /// Default: 1000
    pub max_sample_attempts: usize,

    /// Merge freshly added vertices into a near-duplicate neighbour.
    /// Default: true
    pub use_check_remove_close_vertices: bool,

    /// Merge radius as a fraction of the visibility radius.
    /// Default: 0.5
    pub close_vertex_fraction: f64,

    /// Number of per-worker query slots in the spatial index.
    /// Default: 1
    pub num_threads: usize,

    /// Let path popularity lower edge weights.
    /// Default: false
    pub popularity_bias_enabled: bool,

    /// Weight removed from each traversed edge when bias is enabled.
    /// Default: 0.0
    pub popularity_reduction: f64,

    /// Run the (slow) structural consistency checks after every pass.
    /// Default: false
    pub verify_invariants: bool,
}

impl Default for SparseConfig {
    fn default() -> Self {
        Self {
            sparse_delta_fraction: 0.1,
            dense_delta_fraction: 0.001,
            near_sample_points_multiple: 2,
            stretch_factor: 0.0,
            discretize_penetration_dist: 0.001,
            obstacle_clearance: 0.0,
            fourth_criteria_after_failures: 500,
            terminate_after_failures: 1000,
            max_sample_attempts: 1000,
            use_check_remove_close_vertices: true,
            close_vertex_fraction: 0.5,
            num_threads: 1,
            popularity_bias_enabled: false,
            popularity_reduction: 0.0,
            verify_invariants: false,
        }
    }
}

impl SparseConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SparseConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::Config(format!("{name} must be positive, got {value}")))
            }
        }

        positive("sparse_delta_fraction", self.sparse_delta_fraction)?;
        positive("dense_delta_fraction", self.dense_delta_fraction)?;
        positive("close_vertex_fraction", self.close_vertex_fraction)?;

        if self.stretch_factor < 0.0 || !self.stretch_factor.is_finite() {
            return Err(Error::Config(format!(
                "stretch_factor must be zero (auto) or positive, got {}",
                self.stretch_factor
            )));
        }
        if self.near_sample_points_multiple == 0 {
            return Err(Error::Config("near_sample_points_multiple must be at least 1".into()));
        }
        if self.terminate_after_failures == 0 {
            return Err(Error::Config("terminate_after_failures must be at least 1".into()));
        }
        if self.max_sample_attempts == 0 {
            return Err(Error::Config("max_sample_attempts must be at least 1".into()));
        }
        if self.num_threads == 0 {
            return Err(Error::Config("num_threads must be at least 1".into()));
        }
        if self.obstacle_clearance < 0.0
            || self.discretize_penetration_dist < 0.0
            || self.popularity_reduction < 0.0
        {
            return Err(Error::Config("clearance, penetration and popularity reduction must be non-negative".into()));
        }
        Ok(())
    }

    /// Derive absolute parameters for a space of the given extent and
    /// dimension.
    pub fn resolve(&self, max_extent: f64, dimension: usize) -> Result<ResolvedConfig> {
        self.validate()?;
        if !(max_extent.is_finite() && max_extent > 0.0) {
            return Err(Error::Config(format!("space extent must be positive, got {max_extent}")));
        }
        if dimension == 0 {
            return Err(Error::Config("space dimension must be at least 1".into()));
        }

        let dim = dimension as f64;
        let sparse_delta = self.sparse_delta_fraction * max_extent;
        let dense_delta = self.dense_delta_fraction * max_extent;
        let reach = (sparse_delta - self.discretize_penetration_dist).max(0.0);
        let discretization = 2.0 * (reach * reach / dim).sqrt();

        let stretch_factor = if self.stretch_factor > 0.0 {
            self.stretch_factor
        } else {
            let half = discretization / 2.0;
            let diagonal = (dim * half * half).sqrt();
            if diagonal > 0.0 {
                2.0 * discretization / diagonal
            } else {
                return Err(Error::Config(
                    "automatic stretch factor needs sparse delta above the penetration distance".into(),
                ));
            }
        };

        Ok(ResolvedConfig {
            sparse_delta,
            dense_delta,
            near_sample_points: self.near_sample_points_multiple * dimension,
            discretization,
            stretch_factor,
            obstacle_clearance: self.obstacle_clearance,
            fourth_criteria_after_failures: self.fourth_criteria_after_failures,
            terminate_after_failures: self.terminate_after_failures,
            max_sample_attempts: self.max_sample_attempts,
            use_check_remove_close_vertices: self.use_check_remove_close_vertices,
            close_vertex_fraction: self.close_vertex_fraction,
            num_threads: self.num_threads,
            popularity_bias_enabled: self.popularity_bias_enabled,
            popularity_reduction: self.popularity_reduction,
            verify_invariants: self.verify_invariants,
        })
    }
}

/// Absolute parameters derived from a `SparseConfig` for one space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub sparse_delta: f64,
    pub dense_delta: f64,
    pub near_sample_points: usize,
    pub discretization: f64,
    pub stretch_factor: f64,
    pub obstacle_clearance: f64,
    pub fourth_criteria_after_failures: usize,
    pub terminate_after_failures: usize,
    pub max_sample_attempts: usize,
    pub use_check_remove_close_vertices: bool,
    pub close_vertex_fraction: f64,
    pub num_threads: usize,
    pub popularity_bias_enabled: bool,
    pub popularity_reduction: f64,
    pub verify_invariants: bool,
}

impl ResolvedConfig {
    /// Largest distance at which a fresh vertex may absorb its neighbour.
    pub fn close_vertex_radius(&self) -> f64 {
        self.sparse_delta * self.close_vertex_fraction
    }
}
