//! Time-step-scaled coefficients shared by both backends
//!
//! The CPU and GPU paths never scale parameters themselves; they consume the
//! same `StepCoefficients`, so grid spacing, medium scaling and the stability
//! clamp are defined in exactly one place.

use crate::config::SolverConfig;
use crate::core_types::SimulationParameters;
use nalgebra::Vector2;
use tracing::debug;

/// Upper bound on a relaxation coefficient `a`
///
/// Jacobi stays bounded for any non-negative `a`, but coefficients beyond this
/// value add nothing visible and risk overflow in `1 + 4a`.
pub const MAX_RELAXATION_COEFFICIENT: f32 = 1.0e6;

/// Coefficients for one tick on an N×N grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepCoefficients {
    /// Integration time step
    pub dt: f32,
    /// Backtrace distance scale for advection, `dt * (N - 2)`
    pub dt0: f32,
    /// Viscous relaxation coefficient, `dt * viscosity * (N - 2)²`
    pub viscosity_a: f32,
    /// Density relaxation coefficient, `dt * diffusion * (N - 2)²`
    pub diffusion_a: f32,
    /// Per-tick multiplicative decay
    pub decay: f32,
    /// Wind body force
    pub force: Vector2<f32>,
    /// Global release rate for sources without an override
    pub release_rate: f32,
}

impl StepCoefficients {
    /// Derive coefficients from sanitized parameters
    #[must_use]
    pub fn derive(params: &SimulationParameters, config: &SolverConfig) -> Self {
        let interior = config.grid_size.saturating_sub(2) as f32;
        let dt = config.base_time_step * params.simulation_speed;

        Self {
            dt,
            dt0: dt * interior,
            viscosity_a: stable_coefficient(
                "viscosity",
                dt * params.effective_viscosity() * interior * interior,
            ),
            diffusion_a: stable_coefficient(
                "diffusion",
                dt * params.effective_diffusion() * interior * interior,
            ),
            decay: params.decay_factor,
            force: params.wind_force(config.force_scale),
            release_rate: params.release_rate,
        }
    }
}

fn stable_coefficient(name: &str, a: f32) -> f32 {
    if !a.is_finite() {
        debug!("{} coefficient is not finite, disabling the solve", name);
        return 0.0;
    }
    if a > MAX_RELAXATION_COEFFICIENT {
        debug!(
            "{} coefficient {} clamped to {}",
            name, a, MAX_RELAXATION_COEFFICIENT
        );
    }
    a.clamp(0.0, MAX_RELAXATION_COEFFICIENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Medium;
    use approx::assert_relative_eq;

    #[test]
    fn test_coefficients_scale_with_grid() {
        let config = SolverConfig::with_grid_size(50);
        let params = SimulationParameters {
            diffusion_rate: 0.1,
            viscosity: 0.0,
            simulation_speed: 2.0,
            ..SimulationParameters::default()
        };
        let coeffs = StepCoefficients::derive(&params, &config);

        assert_relative_eq!(coeffs.dt, 0.2);
        assert_relative_eq!(coeffs.dt0, 0.2 * 48.0);
        assert_relative_eq!(coeffs.diffusion_a, 0.2 * 0.1 * 48.0 * 48.0, max_relative = 1e-5);
        assert_eq!(coeffs.viscosity_a, 0.0);
    }

    #[test]
    fn test_medium_rescales_diffusion() {
        let config = SolverConfig::with_grid_size(50);
        let air = SimulationParameters {
            diffusion_rate: 0.1,
            ..SimulationParameters::default()
        };
        let water = SimulationParameters {
            medium: Medium::Water,
            ..air
        };
        let a_air = StepCoefficients::derive(&air, &config).diffusion_a;
        let a_water = StepCoefficients::derive(&water, &config).diffusion_a;
        assert_relative_eq!(a_water, a_air * 0.25, max_relative = 1e-5);
    }

    #[test]
    fn test_huge_coefficients_are_clamped() {
        let config = SolverConfig::default();
        let params = SimulationParameters {
            diffusion_rate: 1.0e30,
            ..SimulationParameters::default()
        };
        let coeffs = StepCoefficients::derive(&params, &config);
        assert_eq!(coeffs.diffusion_a, MAX_RELAXATION_COEFFICIENT);
    }
}
