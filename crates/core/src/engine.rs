//! Engine facade
//!
//! `DispersionEngine` owns every grid of one simulation instance and exposes the
//! step/query/reset contract. It runs the velocity step on the CPU and hands the
//! density step to the selected backend, falling back to the CPU when the GPU
//! cannot be brought up.

use crate::config::{ExecutionMode, SolverConfig};
use crate::core_types::{build_injection, PollutionSource, SimulationParameters};
use crate::error::SimError;
use crate::grid::{FieldData, ObstacleMask};
use crate::solver::{
    create_density_solver, DensitySolver, DensityStepInput, FrameTimer, ProfilerScope,
    StepCoefficients, VelocitySolver,
};
use tracing::{debug, info, warn};

/// Pollutant dispersion simulation on an N×N grid
pub struct DispersionEngine {
    config: SolverConfig,

    /// Density backend for the current execution mode
    backend: Box<dyn DensitySolver>,
    /// Backend of the other mode, kept after a switch so toggling back is cheap
    parked: Option<Box<dyn DensitySolver>>,
    mode: ExecutionMode,
    fallback_reason: Option<String>,

    velocity: VelocitySolver,
    obstacles: ObstacleMask,
    injection: FieldData,

    params: SimulationParameters,
    tick: u64,
    timer: FrameTimer,
}

impl DispersionEngine {
    /// Create an engine from a configuration
    ///
    /// If `config.execution` asks for the parallel path and no GPU can be
    /// initialised, the engine starts on the sequential path and records why.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidConfig` when the configuration fails
    /// [`SolverConfig::validate`].
    pub fn new(config: SolverConfig) -> Result<Self, SimError> {
        config.validate()?;
        let size = config.grid_size;

        let (backend, fallback) = create_density_solver(config.execution, &config);
        let fallback_reason = fallback.map(|error| error.to_string());
        let mode = if backend.is_gpu_accelerated() {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        };

        info!(
            "Dispersion engine initialized: {}x{} grid, {} sweeps, GPU={}",
            size,
            size,
            config.relaxation_iterations,
            backend.is_gpu_accelerated()
        );

        Ok(Self {
            velocity: VelocitySolver::new(size, config.relaxation_iterations),
            obstacles: ObstacleMask::new(size),
            injection: FieldData::new(size),
            backend,
            parked: None,
            mode,
            fallback_reason,
            params: SimulationParameters::default().sanitized(),
            tick: 0,
            timer: FrameTimer::new(),
            config,
        })
    }

    /// Create a sequential engine with default settings on an N×N grid
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidConfig` when `size` is below the minimum grid
    /// size.
    pub fn with_size(size: usize) -> Result<Self, SimError> {
        Self::new(SolverConfig::with_grid_size(size))
    }

    /// Advance one tick, reading back GPU results per `SolverConfig::readback`
    pub fn step(&mut self, params: &SimulationParameters, sources: &[PollutionSource]) {
        self.step_with(params, sources, self.config.readback);
    }

    /// Advance one tick
    ///
    /// Parameters are sanitized first, so out-of-range inputs are clamped
    /// rather than rejected.
    ///
    /// # Arguments
    ///
    /// * `params` - Wind, transport coefficients, decay and release rate
    /// * `sources` - Pollution sources active this tick
    /// * `synchronize` - Copy parallel-path results back to host memory; the
    ///   sequential path is always current
    pub fn step_with(
        &mut self,
        params: &SimulationParameters,
        sources: &[PollutionSource],
        synchronize: bool,
    ) {
        let scope = ProfilerScope::new("dispersion_step");

        let params = params.sanitized();
        let coefficients = StepCoefficients::derive(&params, &self.config);

        self.velocity.step(&coefficients, &self.obstacles);

        build_injection(
            &mut self.injection,
            sources,
            coefficients.release_rate,
            &self.obstacles,
        );

        self.backend.step_density(&DensityStepInput {
            injection: &self.injection,
            velocity_x: self.velocity.velocity_x(),
            velocity_y: self.velocity.velocity_y(),
            coefficients,
            synchronize,
        });

        self.params = params;
        self.tick += 1;
        self.timer.record(scope.elapsed_ms());

        debug!(
            "Tick {}: {} sources, dt={:.4}, {:.2} ms",
            self.tick,
            sources.len(),
            coefficients.dt,
            self.timer.last_frame_time_ms()
        );
    }

    /// Copy of the density field as of the last synchronisation
    pub fn density(&self) -> FieldData {
        let mut field = FieldData::new(self.config.grid_size);
        field.copy_from_slice(&self.backend.read_density());
        field
    }

    /// Copy of the horizontal velocity component
    pub fn velocity_x(&self) -> FieldData {
        self.velocity.velocity_x().clone()
    }

    /// Copy of the vertical velocity component
    pub fn velocity_y(&self) -> FieldData {
        self.velocity.velocity_y().clone()
    }

    /// Replace the obstacle mask
    ///
    /// The mask is copied; later changes to the caller's mask have no effect.
    /// Velocity and density inside newly blocked cells are zeroed at once.
    ///
    /// # Errors
    ///
    /// Returns `SimError::DimensionMismatch` when the mask is not N×N.
    pub fn set_obstacles(&mut self, mask: &ObstacleMask) -> Result<(), SimError> {
        let n = self.config.grid_size;
        if mask.size() != n {
            return Err(SimError::DimensionMismatch {
                expected: n * n,
                actual: mask.size() * mask.size(),
            });
        }

        self.obstacles.clone_from(mask);
        self.velocity.apply_obstacles(&self.obstacles);
        self.backend.set_obstacles(&self.obstacles);
        debug!("Obstacle mask replaced: {} blocked cells", mask.count());
        Ok(())
    }

    /// Add pollutant at one cell, saturating at 255
    ///
    /// A non-finite amount is ignored and obstacle cells stay empty.
    ///
    /// # Errors
    ///
    /// Returns `SimError::OutOfBounds` when `(x, y)` lies outside the grid.
    pub fn add_density_source(&mut self, x: usize, y: usize, amount: f32) -> Result<(), SimError> {
        let size = self.config.grid_size;
        if x >= size || y >= size {
            return Err(SimError::OutOfBounds { x, y, size });
        }
        if !amount.is_finite() {
            debug!("Ignoring non-finite density amount at ({}, {})", x, y);
            return Ok(());
        }
        self.backend.add_density(x, y, amount);
        Ok(())
    }

    /// Zero velocity and density, keeping the obstacle mask
    pub fn reset(&mut self) {
        self.velocity.reset();
        self.backend.clear();
        if let Some(parked) = self.parked.as_mut() {
            parked.clear();
        }
        self.tick = 0;
        info!("Simulation reset");
    }

    /// Zero velocity and density and clear the obstacle mask
    pub fn reset_all(&mut self) {
        self.obstacles.clear();
        self.backend.set_obstacles(&self.obstacles);
        self.reset();
    }

    /// Switch between the sequential and parallel paths
    ///
    /// The density field is carried across. If the parallel path cannot be
    /// initialised, the engine stays sequential and records the reason.
    ///
    /// # Returns
    ///
    /// The execution mode in effect after the call
    pub fn set_execution_mode(&mut self, parallel: bool) -> ExecutionMode {
        let requested = if parallel {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        };
        if requested == self.mode {
            return self.mode;
        }

        let mut next = match self.parked.take() {
            Some(parked) if parked.is_gpu_accelerated() == parallel => parked,
            _ => {
                let (solver, reason) = create_density_solver(requested, &self.config);
                if let Some(error) = reason {
                    warn!("Staying on the sequential path: {}", error);
                    self.fallback_reason = Some(error.to_string());
                    return self.mode;
                }
                solver
            }
        };

        self.backend.synchronize();
        let density = self.backend.read_density().into_owned();

        next.set_obstacles(&self.obstacles);
        next.write_density(&density);

        self.parked = Some(std::mem::replace(&mut self.backend, next));
        self.mode = requested;
        info!("Execution mode switched to {:?}", requested);
        self.mode
    }

    /// Make `density` reflect the latest step on the parallel path
    pub fn synchronize(&mut self) {
        self.backend.synchronize();
    }

    /// Grid size N
    pub fn size(&self) -> usize {
        self.config.grid_size
    }

    /// Ticks since construction or the last reset
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Execution mode in effect
    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    /// `true` when the density step runs on the GPU
    pub fn is_parallel(&self) -> bool {
        self.mode == ExecutionMode::Parallel
    }

    /// Why the parallel path was last refused, if it ever was
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    /// Total pollutant over the interior cells
    pub fn total_mass(&self) -> f64 {
        self.density().interior_sum()
    }

    /// Highest density of any cell
    pub fn max_density(&self) -> f32 {
        self.backend
            .read_density()
            .iter()
            .copied()
            .fold(0.0, f32::max)
    }

    /// Parameters used by the last step, after sanitizing
    pub fn parameters(&self) -> &SimulationParameters {
        &self.params
    }

    /// Current obstacle mask
    pub fn obstacles(&self) -> &ObstacleMask {
        &self.obstacles
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Wall-clock duration of the last step in milliseconds
    pub fn last_step_ms(&self) -> f64 {
        self.timer.last_frame_time_ms()
    }

    /// Mean wall-clock duration of every step since construction, in milliseconds
    pub fn average_step_ms(&self) -> f64 {
        self.timer.average_frame_time_ms()
    }
}
