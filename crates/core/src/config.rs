//! Solver configuration
//!
//! Fixed for the lifetime of an engine. Per-tick inputs live in
//! [`SimulationParameters`](crate::SimulationParameters) instead.

use crate::error::SimError;
use crate::solver::QualityPreset;
use serde::{Deserialize, Serialize};

/// Smallest grid with a non-empty interior
pub const MIN_GRID_SIZE: usize = 4;

/// Which backend runs the density step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// CPU path (always available)
    #[default]
    Sequential,
    /// GPU compute path (falls back to `Sequential` when unavailable)
    Parallel,
}

/// Construction-time configuration of a [`DispersionEngine`](crate::DispersionEngine)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Grid size N (cells per side, ghost ring included)
    pub grid_size: usize,
    /// Jacobi sweeps per diffusion or pressure solve
    pub relaxation_iterations: usize,
    /// Integration time step at simulation speed 1.0
    pub base_time_step: f32,
    /// Converts wind speed into a body force
    pub force_scale: f32,
    /// Copy GPU results back to host memory after every `step`
    pub readback: bool,
    /// Backend requested at construction
    pub execution: ExecutionMode,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::from_quality(QualityPreset::Medium)
    }
}

impl SolverConfig {
    /// Configuration matching a quality preset
    #[must_use]
    pub fn from_quality(quality: QualityPreset) -> Self {
        Self {
            grid_size: quality.grid_size(),
            relaxation_iterations: quality.relaxation_iterations(),
            base_time_step: 0.1,
            force_scale: 1.0,
            readback: true,
            execution: ExecutionMode::Sequential,
        }
    }

    /// Default configuration with a custom grid size
    #[must_use]
    pub fn with_grid_size(grid_size: usize) -> Self {
        Self {
            grid_size,
            ..Self::default()
        }
    }

    /// Check that the configuration can drive a solver
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidConfig` when the grid is smaller than
    /// `MIN_GRID_SIZE`, no relaxation sweeps are requested, or the time step or
    /// force scale is not a finite positive number.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.grid_size < MIN_GRID_SIZE {
            return Err(SimError::InvalidConfig(format!(
                "grid_size must be at least {MIN_GRID_SIZE}, got {}",
                self.grid_size
            )));
        }
        if self.relaxation_iterations == 0 {
            return Err(SimError::InvalidConfig(
                "relaxation_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.base_time_step.is_finite() && self.base_time_step > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "base_time_step must be finite and positive, got {}",
                self.base_time_step
            )));
        }
        if !(self.force_scale.is_finite() && self.force_scale >= 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "force_scale must be finite and non-negative, got {}",
                self.force_scale
            )));
        }
        Ok(())
    }
}
