//! Scalar grid storage shared by the CPU and GPU backends
//!
//! Every quantity the solver tracks (velocity components, density, pressure,
//! divergence) lives in an N×N `FieldData` stored as a flat `Vec<f32>` in
//! row-major order. The outermost ring of cells is the ghost ring rewritten by
//! the boundary enforcer; the interior spans `1..=N-2` on both axes.

/// Square field stored in row-major order (`y * size + x`)
#[derive(Debug, Clone, PartialEq)]
pub struct FieldData {
    data: Vec<f32>,
    size: usize,
}

impl FieldData {
    /// Create a new N×N field initialized to zero
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self::with_value(size, 0.0)
    }

    /// Create a new N×N field initialized to a value
    #[must_use]
    pub fn with_value(size: usize, value: f32) -> Self {
        Self {
            data: vec![value; size * size],
            size,
        }
    }

    /// Grid size N (cells per side)
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Total number of cells (N × N)
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a zero-sized grid
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat index of cell `(x, y)`
    #[inline]
    #[must_use]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.size + x
    }

    /// Get reference to field data
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Get mutable reference to field data
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Get value at grid position
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        assert!(x < self.size && y < self.size, "Coordinates out of bounds");
        self.data[y * self.size + x]
    }

    /// Set value at grid position
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        assert!(x < self.size && y < self.size, "Coordinates out of bounds");
        self.data[y * self.size + x] = value;
    }

    /// Fill entire field with a value
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Overwrite this field with the contents of another field of the same size
    ///
    /// # Panics
    ///
    /// Panics if the two fields differ in size
    pub fn copy_from(&mut self, other: &FieldData) {
        assert_eq!(self.size, other.size, "Field size mismatch in copy_from");
        self.data.copy_from_slice(&other.data);
    }

    /// Overwrite this field from a row-major slice
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` differs from the number of cells
    pub fn copy_from_slice(&mut self, values: &[f32]) {
        self.data.copy_from_slice(values);
    }

    /// Sum of the interior cells (the ghost ring only mirrors interior values)
    #[must_use]
    pub fn interior_sum(&self) -> f64 {
        let n = self.size;
        if n < 3 {
            return 0.0;
        }
        self.data
            .chunks_exact(n)
            .skip(1)
            .take(n - 2)
            .map(|row| row[1..n - 1].iter().map(|&v| f64::from(v)).sum::<f64>())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_creation() {
        let field = FieldData::new(10);
        assert_eq!(field.size(), 10);
        assert_eq!(field.len(), 100);
        assert!(field.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_field_get_set() {
        let mut field = FieldData::new(10);
        field.set(3, 4, 123.45);
        assert_eq!(field.get(3, 4), 123.45);

        // Verify row-major indexing
        assert_eq!(field.as_slice()[4 * 10 + 3], 123.45);
        assert_eq!(field.index(3, 4), 43);
    }

    #[test]
    fn test_interior_sum_ignores_ghost_ring() {
        let mut field = FieldData::with_value(5, 1.0);
        // 3×3 interior
        assert!((field.interior_sum() - 9.0).abs() < 1e-9);

        field.set(0, 2, 100.0);
        field.set(4, 4, 100.0);
        assert!((field.interior_sum() - 9.0).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "Coordinates out of bounds")]
    fn test_field_bounds_check() {
        let field = FieldData::new(10);
        let _ = field.get(10, 5);
    }
}
