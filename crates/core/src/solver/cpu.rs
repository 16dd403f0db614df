//! CPU-based density solver implementation
//!
//! This module provides a CPU implementation of the `DensitySolver` trait using
//! `FieldData` arrays and Rayon for parallelism. This backend is always available
//! and serves as the fallback when GPU acceleration is not available.

use super::advection::advect;
use super::r#trait::{DensitySolver, DensityStepInput};
use super::relax::RelaxationSolver;
use crate::grid::{zero_obstacles, BoundaryKind, FieldData, ObstacleMask};
use rayon::prelude::*;
use std::borrow::Cow;

/// Density ceiling for a single cell
pub const MAX_DENSITY: f32 = 255.0;

/// CPU-based density solver using Rayon for parallelism
///
/// All buffers are allocated once; a step never allocates.
pub struct CpuDensitySolver {
    density: FieldData,
    // Pre-diffusion / pre-advection copy
    density_prev: FieldData,
    obstacles: ObstacleMask,
    relax: RelaxationSolver,
}

impl CpuDensitySolver {
    /// Create a new CPU density solver
    ///
    /// # Arguments
    ///
    /// * `size` - Grid size N
    /// * `iterations` - Jacobi sweeps per diffusion solve
    ///
    /// # Returns
    ///
    /// New CPU density solver with an empty field and no obstacles
    #[must_use]
    pub fn new(size: usize, iterations: usize) -> Self {
        Self {
            density: FieldData::new(size),
            density_prev: FieldData::new(size),
            obstacles: ObstacleMask::new(size),
            relax: RelaxationSolver::new(size, iterations),
        }
    }

    fn inject(&mut self, injection: &FieldData) {
        let obstacles = &self.obstacles;
        self.density
            .as_mut_slice()
            .par_iter_mut()
            .zip(injection.as_slice().par_iter())
            .enumerate()
            .for_each(|(idx, (d, &amount))| {
                if amount > 0.0 && !obstacles.is_blocked_index(idx) {
                    *d = (*d + amount).min(MAX_DENSITY);
                }
            });
    }

    fn decay(&mut self, decay: f32) {
        self.density
            .as_mut_slice()
            .par_iter_mut()
            .for_each(|d| *d = (*d * decay).clamp(0.0, MAX_DENSITY));
        zero_obstacles(self.density.as_mut_slice(), &self.obstacles);
    }
}

impl DensitySolver for CpuDensitySolver {
    fn step_density(&mut self, input: &DensityStepInput<'_>) {
        let coeffs = &input.coefficients;

        self.inject(input.injection);

        if coeffs.diffusion_a > 0.0 {
            let a = coeffs.diffusion_a;
            self.density_prev.copy_from(&self.density);
            self.relax.solve(
                &mut self.density,
                &self.density_prev,
                a,
                1.0 + 4.0 * a,
                BoundaryKind::Scalar,
                &self.obstacles,
            );
        }

        self.density_prev.copy_from(&self.density);
        advect(
            &mut self.density,
            &self.density_prev,
            input.velocity_x,
            input.velocity_y,
            coeffs.dt0,
            BoundaryKind::Scalar,
            &self.obstacles,
        );

        self.decay(coeffs.decay);
    }

    fn set_obstacles(&mut self, obstacles: &ObstacleMask) {
        self.obstacles.clone_from(obstacles);
        zero_obstacles(self.density.as_mut_slice(), &self.obstacles);
    }

    fn read_density(&self) -> Cow<'_, [f32]> {
        Cow::Borrowed(self.density.as_slice())
    }

    fn write_density(&mut self, density: &[f32]) {
        for (dst, &src) in self.density.as_mut_slice().iter_mut().zip(density) {
            *dst = src.clamp(0.0, MAX_DENSITY);
        }
        zero_obstacles(self.density.as_mut_slice(), &self.obstacles);
    }

    fn add_density(&mut self, x: usize, y: usize, amount: f32) {
        if self.obstacles.is_blocked(x, y) {
            return;
        }
        let current = self.density.get(x, y);
        self.density.set(x, y, (current + amount).clamp(0.0, MAX_DENSITY));
    }

    fn synchronize(&mut self) {}

    fn clear(&mut self) {
        self.density.fill(0.0);
        self.density_prev.fill(0.0);
    }

    fn size(&self) -> usize {
        self.density.size()
    }

    fn is_gpu_accelerated(&self) -> bool {
        false
    }
}
