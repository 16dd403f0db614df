//! Jacobi relaxation for the implicit diffusion and pressure systems
//!
//! Solves `c·x − a·Σneighbours(x) = x0` over the open interior cells:
//!
//! ```text
//! x'[i][j] = (x0[i][j] + a * (x[i-1][j] + x[i+1][j] + x[i][j-1] + x[i][j+1])) / c
//! ```
//!
//! Every sweep reads only the previous iterate, so rows are updated in parallel
//! with rayon and the result does not depend on scheduling. Obstacle cells are
//! pinned to zero; a blocked neighbour contributes the updating cell's own
//! previous value, which makes obstacles behave like the reflective box walls.

use crate::grid::{set_boundary, BoundaryKind, FieldData, ObstacleMask};
use rayon::prelude::*;

/// Fixed-sweep Jacobi solver owning its scratch buffer
#[derive(Debug, Clone)]
pub struct RelaxationSolver {
    iterations: usize,
    scratch: FieldData,
}

impl RelaxationSolver {
    /// Create a solver for an N×N grid running `iterations` sweeps per solve
    #[must_use]
    pub fn new(size: usize, iterations: usize) -> Self {
        Self {
            iterations,
            scratch: FieldData::new(size),
        }
    }

    /// Sweeps per solve
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Relax `x` towards the solution for source term `x0`
    ///
    /// The current content of `x` is the initial guess. After every sweep the
    /// boundary enforcer runs on the new iterate, then the iterate and the
    /// scratch buffer swap roles.
    pub fn solve(
        &mut self,
        x: &mut FieldData,
        x0: &FieldData,
        a: f32,
        c: f32,
        kind: BoundaryKind,
        obstacles: &ObstacleMask,
    ) {
        let n = x.size();
        assert_eq!(
            self.scratch.size(),
            n,
            "relaxation scratch buffer does not match the field size"
        );

        for _ in 0..self.iterations {
            jacobi_sweep(
                x.as_slice(),
                x0.as_slice(),
                self.scratch.as_mut_slice(),
                obstacles,
                n,
                a,
                c,
            );
            set_boundary(&mut self.scratch, kind, obstacles);
            std::mem::swap(x, &mut self.scratch);
        }
    }
}

/// One Jacobi sweep from `prev` into `out`
///
/// Ghost-ring cells are copied through unchanged; the boundary pass that
/// follows rewrites them.
pub fn jacobi_sweep(
    prev: &[f32],
    x0: &[f32],
    out: &mut [f32],
    obstacles: &ObstacleMask,
    n: usize,
    a: f32,
    c: f32,
) {
    out.par_chunks_mut(n).enumerate().for_each(|(y, row)| {
        let row_start = y * n;
        if y == 0 || y + 1 == n {
            row.copy_from_slice(&prev[row_start..row_start + n]);
            return;
        }

        row[0] = prev[row_start];
        row[n - 1] = prev[row_start + n - 1];

        for x in 1..n - 1 {
            let idx = row_start + x;
            if obstacles.is_blocked_index(idx) {
                row[x] = 0.0;
                continue;
            }

            let centre = prev[idx];
            let neighbour = |j: usize| {
                if obstacles.is_blocked_index(j) {
                    centre
                } else {
                    prev[j]
                }
            };
            let sum = neighbour(idx - 1) + neighbour(idx + 1) + neighbour(idx - n) + neighbour(idx + n);
            row[x] = (x0[idx] + a * sum) / c;
        }
    });
}
