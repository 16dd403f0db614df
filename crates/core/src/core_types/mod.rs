//! Core types shared by every solver stage

pub mod parameters;
pub mod source;

pub use parameters::{Medium, SimulationParameters, MAX_SIMULATION_SPEED, MIN_SIMULATION_SPEED};
pub use source::{build_injection, PollutionSource, SourceKind};
