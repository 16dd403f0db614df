//! Velocity step: force → diffuse → project → advect → project
//!
//! The velocity field always advances on the CPU. Both density backends read
//! the result, the GPU path after it has been uploaded as a packed buffer.

use super::advection::advect;
use super::coefficients::StepCoefficients;
use super::relax::RelaxationSolver;
use crate::grid::{set_boundary, BoundaryKind, FieldData, ObstacleMask};
use nalgebra::Vector2;
use rayon::prelude::*;

/// Owns the velocity components and every scratch buffer the step needs
#[derive(Debug, Clone)]
pub struct VelocitySolver {
    u: FieldData,
    v: FieldData,
    u_prev: FieldData,
    v_prev: FieldData,
    pressure: FieldData,
    divergence: FieldData,
    relax: RelaxationSolver,
}

impl VelocitySolver {
    /// Allocate a zero velocity field on an N×N grid
    #[must_use]
    pub fn new(size: usize, iterations: usize) -> Self {
        Self {
            u: FieldData::new(size),
            v: FieldData::new(size),
            u_prev: FieldData::new(size),
            v_prev: FieldData::new(size),
            pressure: FieldData::new(size),
            divergence: FieldData::new(size),
            relax: RelaxationSolver::new(size, iterations),
        }
    }

    /// Horizontal velocity component
    #[must_use]
    pub fn velocity_x(&self) -> &FieldData {
        &self.u
    }

    /// Vertical velocity component
    #[must_use]
    pub fn velocity_y(&self) -> &FieldData {
        &self.v
    }

    /// Zero every buffer
    pub fn reset(&mut self) {
        for field in [
            &mut self.u,
            &mut self.v,
            &mut self.u_prev,
            &mut self.v_prev,
            &mut self.pressure,
            &mut self.divergence,
        ] {
            field.fill(0.0);
        }
    }

    /// Zero velocity inside newly placed obstacles
    pub fn apply_obstacles(&mut self, obstacles: &ObstacleMask) {
        set_boundary(&mut self.u, BoundaryKind::VelocityX, obstacles);
        set_boundary(&mut self.v, BoundaryKind::VelocityY, obstacles);
    }

    /// Advance the velocity field by one tick
    pub fn step(&mut self, coeffs: &StepCoefficients, obstacles: &ObstacleMask) {
        self.add_force(coeffs.dt, coeffs.force, obstacles);

        if coeffs.viscosity_a > 0.0 {
            let a = coeffs.viscosity_a;
            self.u_prev.copy_from(&self.u);
            self.relax.solve(
                &mut self.u,
                &self.u_prev,
                a,
                1.0 + 4.0 * a,
                BoundaryKind::VelocityX,
                obstacles,
            );
            self.v_prev.copy_from(&self.v);
            self.relax.solve(
                &mut self.v,
                &self.v_prev,
                a,
                1.0 + 4.0 * a,
                BoundaryKind::VelocityY,
                obstacles,
            );
        }

        self.project(obstacles);

        self.u_prev.copy_from(&self.u);
        self.v_prev.copy_from(&self.v);
        advect(
            &mut self.u,
            &self.u_prev,
            &self.u_prev,
            &self.v_prev,
            coeffs.dt0,
            BoundaryKind::VelocityX,
            obstacles,
        );
        advect(
            &mut self.v,
            &self.v_prev,
            &self.u_prev,
            &self.v_prev,
            coeffs.dt0,
            BoundaryKind::VelocityY,
            obstacles,
        );

        self.project(obstacles);
    }

    /// Add `dt * force` to every open cell
    fn add_force(&mut self, dt: f32, force: Vector2<f32>, obstacles: &ObstacleMask) {
        let (fx, fy) = (dt * force.x, dt * force.y);
        if fx == 0.0 && fy == 0.0 {
            return;
        }

        let cells = self.u.as_mut_slice().iter_mut().zip(self.v.as_mut_slice());
        for (idx, (u, v)) in cells.enumerate() {
            if !obstacles.is_blocked_index(idx) {
                *u += fx;
                *v += fy;
            }
        }

        set_boundary(&mut self.u, BoundaryKind::VelocityX, obstacles);
        set_boundary(&mut self.v, BoundaryKind::VelocityY, obstacles);
    }

    /// Remove the divergent part of the velocity field
    ///
    /// Solves `∇²p = ∇·u` with the relaxation solver and subtracts `∇p`. A
    /// blocked neighbour contributes the centre pressure, so no gradient is
    /// applied across a wall.
    ///
    /// The solve is warm-started from the previous projection's pressure;
    /// only `reset` clears it.
    fn project(&mut self, obstacles: &ObstacleMask) {
        let n = self.u.size();
        let h = 1.0 / n.saturating_sub(2).max(1) as f32;

        {
            let u = self.u.as_slice();
            let v = self.v.as_slice();
            self.divergence
                .as_mut_slice()
                .par_chunks_mut(n)
                .enumerate()
                .for_each(|(y, row)| {
                    row.fill(0.0);
                    if y == 0 || y + 1 == n {
                        return;
                    }
                    for x in 1..n - 1 {
                        let idx = y * n + x;
                        if obstacles.is_blocked_index(idx) {
                            continue;
                        }
                        row[x] = -0.5 * h * (u[idx + 1] - u[idx - 1] + v[idx + n] - v[idx - n]);
                    }
                });
        }
        set_boundary(&mut self.divergence, BoundaryKind::Scalar, obstacles);

        self.relax.solve(
            &mut self.pressure,
            &self.divergence,
            1.0,
            4.0,
            BoundaryKind::Scalar,
            obstacles,
        );

        let p = self.pressure.as_slice();
        self.u
            .as_mut_slice()
            .par_chunks_mut(n)
            .zip(self.v.as_mut_slice().par_chunks_mut(n))
            .enumerate()
            .for_each(|(y, (u_row, v_row))| {
                if y == 0 || y + 1 == n {
                    return;
                }
                for x in 1..n - 1 {
                    let idx = y * n + x;
                    if obstacles.is_blocked_index(idx) {
                        continue;
                    }
                    let centre = p[idx];
                    let p_at = |j: usize| {
                        if obstacles.is_blocked_index(j) {
                            centre
                        } else {
                            p[j]
                        }
                    };
                    u_row[x] -= 0.5 * (p_at(idx + 1) - p_at(idx - 1)) / h;
                    v_row[x] -= 0.5 * (p_at(idx + n) - p_at(idx - n)) / h;
                }
            });

        set_boundary(&mut self.u, BoundaryKind::VelocityX, obstacles);
        set_boundary(&mut self.v, BoundaryKind::VelocityY, obstacles);
    }

    /// Mean absolute discrete divergence over open interior cells
    #[must_use]
    pub fn mean_divergence(&self, obstacles: &ObstacleMask) -> f32 {
        let n = self.u.size();
        let u = self.u.as_slice();
        let v = self.v.as_slice();
        let mut total = 0.0_f64;
        let mut cells = 0_u32;
        for y in 1..n.saturating_sub(1) {
            for x in 1..n - 1 {
                let idx = y * n + x;
                if obstacles.is_blocked_index(idx) {
                    continue;
                }
                let div = 0.5 * (u[idx + 1] - u[idx - 1] + v[idx + n] - v[idx - n]);
                total += f64::from(div.abs());
                cells += 1;
            }
        }
        if cells == 0 {
            0.0
        } else {
            (total / f64::from(cells)) as f32
        }
    }
}
