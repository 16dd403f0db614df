//! Error types for the dispersion core
//!
//! Only a handful of operations can fail: replacing the obstacle mask with one of
//! the wrong size, injecting pollutant outside the grid, building a solver from an
//! invalid configuration, and bringing up the GPU backend. The last one never
//! escapes the engine facade, which converts it into a CPU fallback.

use std::fmt;

/// Errors reported by the dispersion core
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// A grid handed to the core does not match the configured grid size.
    DimensionMismatch {
        /// Number of cells the engine expects (N × N)
        expected: usize,
        /// Number of cells that were supplied
        actual: usize,
    },
    /// A cell coordinate lies outside the grid.
    OutOfBounds {
        /// X coordinate that was requested
        x: usize,
        /// Y coordinate that was requested
        y: usize,
        /// Grid size N
        size: usize,
    },
    /// The solver configuration cannot be used.
    InvalidConfig(String),
    /// The parallel (GPU) path could not be initialised.
    GpuUnavailable(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { expected, actual } => write!(
                f,
                "grid dimension mismatch: expected {expected} cells, got {actual}"
            ),
            Self::OutOfBounds { x, y, size } => {
                write!(f, "cell ({x}, {y}) is outside the {size}x{size} grid")
            }
            Self::InvalidConfig(message) => write!(f, "invalid solver configuration: {message}"),
            Self::GpuUnavailable(message) => write!(f, "GPU backend unavailable: {message}"),
        }
    }
}

impl std::error::Error for SimError {}
