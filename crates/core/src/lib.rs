//! Pollutant Dispersion Core Library
//!
//! A 2D Eulerian solver for pollutant transport over a square grid. Each tick a
//! wind body force drives an incompressible velocity field, and a pollutant
//! density field is injected, diffused, advected along that velocity and
//! decayed. Impermeable obstacle cells block both flow and pollutant.
//!
//! ## Execution paths
//!
//! - Sequential: the whole tick runs on the CPU with rayon row parallelism and
//!   is bit-deterministic for a fixed input sequence.
//! - Parallel: the density step runs as wgpu compute passes over ping-pong
//!   buffers (requires the default `gpu` feature). When no GPU can be
//!   initialised the engine falls back to the sequential path.
//!
//! ## Example
//!
//! ```rust
//! use plume_sim_core::{DispersionEngine, PollutionSource, SimulationParameters};
//!
//! let mut engine = DispersionEngine::with_size(50).expect("valid grid size");
//! let chimney = PollutionSource::new(10, 25).with_release(40.0);
//!
//! for _ in 0..10 {
//!     engine.step(&SimulationParameters::default(), &[chimney]);
//! }
//! assert!(engine.total_mass() > 0.0);
//! ```

pub mod config;
pub mod core_types;
pub mod engine;
pub mod error;
pub mod grid;
pub mod solver;

pub use config::{ExecutionMode, SolverConfig, MIN_GRID_SIZE};
pub use core_types::{Medium, PollutionSource, SimulationParameters, SourceKind};
pub use engine::DispersionEngine;
pub use error::SimError;
pub use grid::{BoundaryKind, FieldData, ObstacleMask};
pub use solver::{QualityPreset, MAX_DENSITY};
