//! Boundary enforcement for the closed dispersion box
//!
//! Edge cells mirror their interior neighbour. For a velocity component the
//! mirror is negated on the edges normal to that component, so no flow leaves
//! the box; scalar fields are copied unchanged. Corners average their two edge
//! neighbours and every obstacle cell is forced to zero.
//!
//! The GPU boundary kernel reproduces the same arithmetic, computing corners
//! directly from the nearest interior cell so the pass can run in place.

use super::{FieldData, ObstacleMask};

/// Which mirroring rule applies to a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    /// Density, pressure, divergence: copied unchanged
    Scalar,
    /// Horizontal velocity: negated on the left and right edges
    VelocityX,
    /// Vertical velocity: negated on the top and bottom edges
    VelocityY,
}

impl BoundaryKind {
    /// Mirror factors as `(left/right edges, top/bottom edges)`
    #[must_use]
    pub const fn mirror_signs(self) -> (f32, f32) {
        match self {
            Self::Scalar => (1.0, 1.0),
            Self::VelocityX => (-1.0, 1.0),
            Self::VelocityY => (1.0, -1.0),
        }
    }

    /// Numeric code shared with the WGSL boundary kernel
    #[must_use]
    pub const fn shader_code(self) -> u32 {
        match self {
            Self::Scalar => 0,
            Self::VelocityX => 1,
            Self::VelocityY => 2,
        }
    }
}

/// Apply edge, corner and obstacle conditions to `field`
///
/// # Panics
///
/// Panics if the obstacle mask and the field differ in size. That is a
/// programming error in the caller; the engine facade rejects mismatched masks
/// before they can reach this point.
pub fn set_boundary(field: &mut FieldData, kind: BoundaryKind, obstacles: &ObstacleMask) {
    let n = field.size();
    assert_eq!(
        n,
        obstacles.size(),
        "obstacle mask is {0}x{0} but the field is {1}x{1}",
        obstacles.size(),
        n
    );

    let data = field.as_mut_slice();

    if n >= 3 {
        let (sx, sy) = kind.mirror_signs();
        let last = n - 1;

        for i in 1..last {
            data[i * n] = sx * data[i * n + 1];
            data[i * n + last] = sx * data[i * n + last - 1];
            data[i] = sy * data[n + i];
            data[last * n + i] = sy * data[(last - 1) * n + i];
        }

        data[0] = 0.5 * (data[1] + data[n]);
        data[last] = 0.5 * (data[last - 1] + data[n + last]);
        data[last * n] = 0.5 * (data[last * n + 1] + data[(last - 1) * n]);
        data[last * n + last] = 0.5 * (data[last * n + last - 1] + data[(last - 1) * n + last]);
    }

    zero_obstacles(data, obstacles);
}

/// Force every obstacle cell of a row-major field to zero
pub fn zero_obstacles(data: &mut [f32], obstacles: &ObstacleMask) {
    for (value, &blocked) in data.iter_mut().zip(obstacles.as_slice()) {
        if blocked {
            *value = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> FieldData {
        let mut field = FieldData::new(n);
        for y in 0..n {
            for x in 0..n {
                field.set(x, y, (y * n + x) as f32 + 1.0);
            }
        }
        field
    }

    #[test]
    fn test_scalar_edges_copy_interior() {
        let mut field = ramp(6);
        let mask = ObstacleMask::new(6);
        set_boundary(&mut field, BoundaryKind::Scalar, &mask);

        for i in 1..5 {
            assert_eq!(field.get(0, i), field.get(1, i));
            assert_eq!(field.get(5, i), field.get(4, i));
            assert_eq!(field.get(i, 0), field.get(i, 1));
            assert_eq!(field.get(i, 5), field.get(i, 4));
        }
    }

    #[test]
    fn test_velocity_x_negated_on_vertical_edges() {
        let mut field = ramp(6);
        let mask = ObstacleMask::new(6);
        set_boundary(&mut field, BoundaryKind::VelocityX, &mask);

        for i in 1..5 {
            assert_eq!(field.get(0, i), -field.get(1, i));
            assert_eq!(field.get(5, i), -field.get(4, i));
            // Tangential edges copy unchanged
            assert_eq!(field.get(i, 0), field.get(i, 1));
        }
    }

    #[test]
    fn test_velocity_y_negated_on_horizontal_edges() {
        let mut field = ramp(6);
        let mask = ObstacleMask::new(6);
        set_boundary(&mut field, BoundaryKind::VelocityY, &mask);

        for i in 1..5 {
            assert_eq!(field.get(i, 0), -field.get(i, 1));
            assert_eq!(field.get(i, 5), -field.get(i, 4));
            assert_eq!(field.get(0, i), field.get(1, i));
        }
    }

    #[test]
    fn test_corners_average_edge_neighbours() {
        let mut field = ramp(5);
        let mask = ObstacleMask::new(5);
        set_boundary(&mut field, BoundaryKind::Scalar, &mask);

        let expected = 0.5 * (field.get(1, 0) + field.get(0, 1));
        assert_eq!(field.get(0, 0), expected);
        let expected = 0.5 * (field.get(3, 4) + field.get(4, 3));
        assert_eq!(field.get(4, 4), expected);
    }

    #[test]
    fn test_obstacles_zeroed() {
        let mut field = FieldData::with_value(6, 7.0);
        let mut mask = ObstacleMask::new(6);
        mask.set(2, 2, true);
        mask.set(0, 3, true);
        set_boundary(&mut field, BoundaryKind::Scalar, &mask);

        assert_eq!(field.get(2, 2), 0.0);
        assert_eq!(field.get(0, 3), 0.0);
        assert_eq!(field.get(3, 3), 7.0);
    }

    #[test]
    #[should_panic(expected = "obstacle mask is 4x4")]
    fn test_mismatched_mask_panics() {
        let mut field = FieldData::new(6);
        let mask = ObstacleMask::new(4);
        set_boundary(&mut field, BoundaryKind::Scalar, &mask);
    }
}
