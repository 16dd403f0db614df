//! Grid storage and boundary enforcement

pub mod boundary;
pub mod field;
pub mod obstacles;

// Re-export main types
pub use boundary::{set_boundary, zero_obstacles, BoundaryKind};
pub use field::FieldData;
pub use obstacles::ObstacleMask;
