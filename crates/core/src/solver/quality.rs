//! Quality presets for grid resolution
//!
//! This module defines quality presets that determine grid resolution and the
//! number of relaxation sweeps. Higher quality means a finer grid and a more
//! accurate linear solve, at more computational cost per tick.

use serde::{Deserialize, Serialize};

/// Quality preset determining grid resolution and solver accuracy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityPreset {
    /// Ultra quality: 256×256 grid, 30 sweeps (GPU recommended)
    Ultra,
    /// High quality: 128×128 grid, 20 sweeps
    High,
    /// Medium quality: 80×80 grid, 20 sweeps
    Medium,
    /// Low quality: 48×48 grid, 10 sweeps
    Low,
}

impl QualityPreset {
    /// Grid size N (cells per side, ghost ring included)
    #[must_use]
    pub const fn grid_size(&self) -> usize {
        match self {
            Self::Ultra => 256,
            Self::High => 128,
            Self::Medium => 80,
            Self::Low => 48,
        }
    }

    /// Jacobi sweeps per relaxation solve
    ///
    /// More sweeps bring diffusion and projection closer to the exact solve;
    /// this is a latency/accuracy tunable, not a correctness parameter.
    #[must_use]
    pub const fn relaxation_iterations(&self) -> usize {
        match self {
            Self::Ultra => 30,
            Self::High | Self::Medium => 20,
            Self::Low => 10,
        }
    }

    /// Recommended preset for an unknown machine
    #[must_use]
    pub fn recommended() -> Self {
        Self::Medium
    }
}
