//! Density solver trait definition
//!
//! This module defines the `DensitySolver` trait, the backend-agnostic interface
//! for the density step. Both CPU and GPU implementations implement this trait;
//! the velocity step is shared and always runs on the CPU.

use super::coefficients::StepCoefficients;
use crate::grid::{FieldData, ObstacleMask};
use std::borrow::Cow;

/// Inputs for one density tick
#[derive(Debug, Clone, Copy)]
pub struct DensityStepInput<'a> {
    /// Per-cell amount released this tick, already clamped away from the ghost
    /// ring and obstacle cells
    pub injection: &'a FieldData,
    /// Horizontal velocity after this tick's velocity step
    pub velocity_x: &'a FieldData,
    /// Vertical velocity after this tick's velocity step
    pub velocity_y: &'a FieldData,
    /// Time-step-scaled coefficients shared with the velocity step
    pub coefficients: StepCoefficients,
    /// Copy the result back to host memory before returning
    pub synchronize: bool,
}

/// Backend-agnostic interface for the density step
///
/// One call to `step_density` performs inject → diffuse → advect → decay and
/// leaves every cell in `[0, 255]` with obstacle cells at zero.
pub trait DensitySolver: Send + Sync {
    /// Advance the density field by one tick
    ///
    /// # Arguments
    ///
    /// * `input` - Injection grid, current velocity, coefficients and the
    ///   readback flag
    fn step_density(&mut self, input: &DensityStepInput<'_>);

    /// Replace the obstacle mask
    ///
    /// Density inside newly blocked cells is zeroed immediately.
    fn set_obstacles(&mut self, obstacles: &ObstacleMask);

    /// Read the density field in row-major order
    ///
    /// # Returns
    ///
    /// Density field. The CPU backend returns a borrowed slice; the GPU backend
    /// returns its host snapshot, which is as fresh as the last synchronising
    /// step or `synchronize` call.
    fn read_density(&self) -> Cow<'_, [f32]>;

    /// Overwrite the density field (used when switching backends)
    ///
    /// Values are clamped to `[0, 255]` and obstacle cells are zeroed.
    fn write_density(&mut self, density: &[f32]);

    /// Add pollutant at a single cell, saturating at 255
    ///
    /// Obstacle cells are left untouched.
    fn add_density(&mut self, x: usize, y: usize, amount: f32);

    /// Make `read_density` reflect the latest step
    fn synchronize(&mut self);

    /// Zero the density field
    fn clear(&mut self);

    /// Grid size N
    fn size(&self) -> usize;

    /// Check if this is the GPU backend
    ///
    /// # Returns
    ///
    /// `true` if GPU-accelerated, `false` if CPU-only
    fn is_gpu_accelerated(&self) -> bool;
}
