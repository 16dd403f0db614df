//! Obstacle mask
//!
//! Marks impermeable cells (buildings, terrain, sea walls). Velocity and density
//! are forced to zero inside every blocked cell and relaxation never reads
//! through one.

use crate::error::SimError;
use serde::{Deserialize, Serialize};

/// N×N boolean mask, `true` marks an impermeable cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleMask {
    cells: Vec<bool>,
    size: usize,
}

impl ObstacleMask {
    /// Create an empty (fully open) mask
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![false; size * size],
            size,
        }
    }

    /// Build a mask from row-major cells
    ///
    /// # Errors
    ///
    /// Returns `SimError::DimensionMismatch` if `cells.len()` is not `size * size`.
    pub fn from_cells(size: usize, cells: Vec<bool>) -> Result<Self, SimError> {
        if cells.len() != size * size {
            return Err(SimError::DimensionMismatch {
                expected: size * size,
                actual: cells.len(),
            });
        }
        Ok(Self { cells, size })
    }

    /// Grid size N
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether cell `(x, y)` is blocked; cells outside the grid count as open
    #[must_use]
    pub fn is_blocked(&self, x: usize, y: usize) -> bool {
        x < self.size && y < self.size && self.cells[y * self.size + x]
    }

    /// Whether the cell at a flat row-major index is blocked
    #[inline]
    #[must_use]
    pub fn is_blocked_index(&self, idx: usize) -> bool {
        self.cells[idx]
    }

    /// Mark or clear a single cell; out-of-range coordinates are ignored
    pub fn set(&mut self, x: usize, y: usize, blocked: bool) {
        if x < self.size && y < self.size {
            self.cells[y * self.size + x] = blocked;
        }
    }

    /// Block every cell of the inclusive rectangle `[x0, x1] × [y0, y1]`
    pub fn fill_rect(&mut self, x0: usize, y0: usize, x1: usize, y1: usize) {
        let x1 = x1.min(self.size.saturating_sub(1));
        let y1 = y1.min(self.size.saturating_sub(1));
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.cells[y * self.size + x] = true;
            }
        }
    }

    /// Clear every cell
    pub fn clear(&mut self) {
        self.cells.fill(false);
    }

    /// Number of blocked cells
    #[must_use]
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&blocked| blocked).count()
    }

    /// Row-major cells
    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.cells
    }

    /// Pack the mask as one `u32` word per cell (0 = open, 1 = blocked) for GPU upload
    #[must_use]
    pub fn to_words(&self) -> Vec<u32> {
        self.cells.iter().map(|&blocked| u32::from(blocked)).collect()
    }
}
