//! Grid solver module
//!
//! The velocity step always runs on the CPU. The density step sits behind the
//! `DensitySolver` trait, which has both CPU and GPU implementations.
//!
//! # Feature Flags
//!
//! - `gpu` (default): Enables GPU acceleration via wgpu. Disable with `--no-default-features`
//!   for environments without GPU access.
//!
//! # Backend Selection
//!
//! When the parallel mode is requested:
//! 1. Try GPU (if `gpu` feature enabled and hardware available)
//! 2. Fall back to CPU (always available), reporting why
//!
//! # Example
//!
//! ```rust,ignore
//! use plume_sim_core::solver::create_density_solver;
//! use plume_sim_core::{ExecutionMode, SolverConfig};
//!
//! let config = SolverConfig::default();
//! let (solver, fallback) = create_density_solver(ExecutionMode::Parallel, &config);
//! ```

mod advection;
mod coefficients;
mod context;
mod cpu;
pub mod profiler;
mod quality;
mod relax;
#[allow(clippy::module_name_repetitions)]
mod r#trait;
mod velocity;

#[cfg(feature = "gpu")]
mod gpu;

// Re-exports
pub use advection::advect;
pub use coefficients::{StepCoefficients, MAX_RELAXATION_COEFFICIENT};
pub use context::GpuInitResult;
pub use cpu::{CpuDensitySolver, MAX_DENSITY};
pub use profiler::{FrameTimer, ProfilerScope};
pub use quality::QualityPreset;
pub use r#trait::{DensitySolver, DensityStepInput};
pub use relax::{jacobi_sweep, RelaxationSolver};
pub use velocity::VelocitySolver;

#[cfg(feature = "gpu")]
pub use context::GpuContext;
#[cfg(feature = "gpu")]
pub use gpu::GpuDensitySolver;

use crate::config::{ExecutionMode, SolverConfig};
use crate::error::SimError;
use tracing::info;

#[cfg(feature = "gpu")]
use tracing::warn;

/// Create a density solver for the requested execution mode
///
/// `Sequential` always yields the CPU backend. `Parallel` tries the GPU and
/// falls back to the CPU when it cannot be brought up.
///
/// # Arguments
///
/// * `mode` - Requested execution mode
/// * `config` - Grid size and relaxation sweeps
///
/// # Returns
///
/// The boxed solver, plus a `SimError::GpuUnavailable` explaining the fallback
/// when `Parallel` was requested but the CPU backend was returned
pub fn create_density_solver(
    mode: ExecutionMode,
    config: &SolverConfig,
) -> (Box<dyn DensitySolver>, Option<SimError>) {
    let size = config.grid_size;
    let iterations = config.relaxation_iterations;

    if mode == ExecutionMode::Sequential {
        return (Box::new(CpuDensitySolver::new(size, iterations)), None);
    }

    #[cfg(feature = "gpu")]
    let reason = {
        match GpuContext::new() {
            GpuInitResult::Success(gpu_context) => {
                let adapter = gpu_context.adapter_name().to_string();
                match GpuDensitySolver::new(gpu_context, size, iterations) {
                    Ok(solver) => {
                        info!("Using GPU backend: {} ({}x{} grid)", adapter, size, size);
                        return (Box::new(solver), None);
                    }
                    Err(error) => error,
                }
            }
            other => SimError::GpuUnavailable(
                other
                    .failure_reason()
                    .unwrap_or_else(|| "GPU initialization failed".to_string()),
            ),
        }
    };

    #[cfg(not(feature = "gpu"))]
    let reason = SimError::GpuUnavailable("GPU feature disabled at compile time".to_string());

    #[cfg(feature = "gpu")]
    warn!("{}. Falling back to CPU.", reason);
    #[cfg(not(feature = "gpu"))]
    info!("{}, using CPU backend", reason);

    (
        Box::new(CpuDensitySolver::new(size, iterations)),
        Some(reason),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_mode_uses_cpu() {
        let config = SolverConfig::with_grid_size(16);
        let (solver, fallback) = create_density_solver(ExecutionMode::Sequential, &config);
        assert!(!solver.is_gpu_accelerated());
        assert_eq!(solver.size(), 16);
        assert!(fallback.is_none());
    }

    #[test]
    fn test_parallel_mode_reports_fallback() {
        let config = SolverConfig::with_grid_size(16);
        let (solver, fallback) = create_density_solver(ExecutionMode::Parallel, &config);
        // Either the GPU came up, or we got the CPU and a reason
        assert_eq!(solver.is_gpu_accelerated(), fallback.is_none());
        if let Some(error) = fallback {
            assert!(matches!(error, SimError::GpuUnavailable(_)));
            assert!(error.to_string().starts_with("GPU backend unavailable"));
        }
    }
}
