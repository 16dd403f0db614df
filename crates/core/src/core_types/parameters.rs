//! Per-tick simulation parameters
//!
//! A fresh `SimulationParameters` value is handed to every `step` call; the core
//! keeps no ambient state. Out-of-range values are clamped (never rejected) by
//! [`SimulationParameters::sanitized`] before any coefficient is derived.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lowest accepted simulation-speed multiplier
pub const MIN_SIMULATION_SPEED: f32 = 0.01;
/// Highest accepted simulation-speed multiplier
pub const MAX_SIMULATION_SPEED: f32 = 100.0;

/// Carrier medium of the pollutant
///
/// The medium rescales the user-facing viscosity and diffusion rates so the same
/// slider values give plausible behaviour in both air and water.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Medium {
    /// Atmospheric dispersion (reference scaling)
    #[default]
    Air,
    /// Dispersion in a water body: more momentum damping, slower mixing
    Water,
}

impl Medium {
    /// Multiplier applied to the viscosity parameter
    #[must_use]
    pub const fn viscosity_scale(self) -> f32 {
        match self {
            Self::Air => 1.0,
            Self::Water => 4.0,
        }
    }

    /// Multiplier applied to the diffusion-rate parameter
    #[must_use]
    pub const fn diffusion_scale(self) -> f32 {
        match self {
            Self::Air => 1.0,
            Self::Water => 0.25,
        }
    }
}

/// Inputs for one simulation tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    /// Direction the wind blows towards, degrees (0 = +x, 90 = +y)
    pub wind_direction: f32,
    /// Wind speed (grid units per second before `force_scale`)
    pub wind_speed: f32,
    /// Kinematic viscosity of the carrier
    pub viscosity: f32,
    /// Pollutant diffusion rate
    pub diffusion_rate: f32,
    /// Fraction of concentration kept each tick, `[0, 1]`
    pub decay_factor: f32,
    /// Multiplier on the base integration time step
    pub simulation_speed: f32,
    /// Units released per tick by a source without its own override
    pub release_rate: f32,
    /// Carrier medium
    pub medium: Medium,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            wind_direction: 0.0,
            wind_speed: 2.0,
            viscosity: 0.0001,
            diffusion_rate: 0.0001,
            decay_factor: 0.995,
            simulation_speed: 1.0,
            release_rate: 50.0,
            medium: Medium::Air,
        }
    }
}

impl SimulationParameters {
    /// Parameters with every transport and release term switched off
    ///
    /// Wind, viscosity, diffusion and release are zero; decay keeps everything.
    #[must_use]
    pub fn still() -> Self {
        Self {
            wind_direction: 0.0,
            wind_speed: 0.0,
            viscosity: 0.0,
            diffusion_rate: 0.0,
            decay_factor: 1.0,
            simulation_speed: 1.0,
            release_rate: 0.0,
            medium: Medium::Air,
        }
    }

    /// Return a copy with every field forced into its valid range
    ///
    /// - wind direction wraps into `[0, 360)`
    /// - wind speed, viscosity, diffusion rate and release rate are floored at 0
    /// - decay factor is clamped into `[0, 1]`
    /// - simulation speed is clamped into
    ///   `[MIN_SIMULATION_SPEED, MAX_SIMULATION_SPEED]`
    /// - non-finite values fall back to the defaults
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();

        let wind_direction = if self.wind_direction.is_finite() {
            self.wind_direction.rem_euclid(360.0)
        } else {
            debug!("wind_direction is not finite, using default");
            defaults.wind_direction
        };

        Self {
            wind_direction,
            wind_speed: clamp_param("wind_speed", self.wind_speed, 0.0, f32::MAX, defaults.wind_speed),
            viscosity: clamp_param("viscosity", self.viscosity, 0.0, f32::MAX, defaults.viscosity),
            diffusion_rate: clamp_param(
                "diffusion_rate",
                self.diffusion_rate,
                0.0,
                f32::MAX,
                defaults.diffusion_rate,
            ),
            decay_factor: clamp_param("decay_factor", self.decay_factor, 0.0, 1.0, defaults.decay_factor),
            simulation_speed: clamp_param(
                "simulation_speed",
                self.simulation_speed,
                MIN_SIMULATION_SPEED,
                MAX_SIMULATION_SPEED,
                defaults.simulation_speed,
            ),
            release_rate: clamp_param("release_rate", self.release_rate, 0.0, f32::MAX, defaults.release_rate),
            medium: self.medium,
        }
    }

    /// Uniform body force the wind applies to every open cell
    ///
    /// `(cos θ, sin θ) * speed * force_scale`
    #[must_use]
    pub fn wind_force(&self, force_scale: f32) -> Vector2<f32> {
        let angle_rad = self.wind_direction.to_radians();
        Vector2::new(angle_rad.cos(), angle_rad.sin()) * (self.wind_speed * force_scale)
    }

    /// Viscosity after medium scaling
    #[must_use]
    pub fn effective_viscosity(&self) -> f32 {
        self.viscosity * self.medium.viscosity_scale()
    }

    /// Diffusion rate after medium scaling
    #[must_use]
    pub fn effective_diffusion(&self) -> f32 {
        self.diffusion_rate * self.medium.diffusion_scale()
    }
}

fn clamp_param(name: &str, value: f32, lo: f32, hi: f32, default: f32) -> f32 {
    if !value.is_finite() {
        debug!("{} is not finite, using default {}", name, default);
        return default;
    }
    let clamped = value.clamp(lo, hi);
    if clamped != value {
        debug!("{} = {} out of range, clamped to {}", name, value, clamped);
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sanitized_clamps_out_of_range_values() {
        let params = SimulationParameters {
            wind_direction: -90.0,
            wind_speed: -3.0,
            viscosity: -1.0,
            diffusion_rate: -0.5,
            decay_factor: 1.5,
            simulation_speed: 0.0,
            release_rate: -10.0,
            medium: Medium::Water,
        }
        .sanitized();

        assert_abs_diff_eq!(params.wind_direction, 270.0);
        assert_eq!(params.wind_speed, 0.0);
        assert_eq!(params.viscosity, 0.0);
        assert_eq!(params.diffusion_rate, 0.0);
        assert_eq!(params.decay_factor, 1.0);
        assert_eq!(params.simulation_speed, MIN_SIMULATION_SPEED);
        assert_eq!(params.release_rate, 0.0);
        assert_eq!(params.medium, Medium::Water);
    }

    #[test]
    fn test_sanitized_replaces_non_finite_values() {
        let params = SimulationParameters {
            wind_speed: f32::NAN,
            decay_factor: f32::INFINITY,
            wind_direction: f32::NAN,
            ..SimulationParameters::default()
        }
        .sanitized();

        let defaults = SimulationParameters::default();
        assert_eq!(params.wind_speed, defaults.wind_speed);
        assert_eq!(params.decay_factor, defaults.decay_factor);
        assert_eq!(params.wind_direction, defaults.wind_direction);
    }

    #[test]
    fn test_sanitized_keeps_valid_values() {
        let params = SimulationParameters::default();
        assert_eq!(params.sanitized(), params);
    }

    #[test]
    fn test_wind_force_direction() {
        let east = SimulationParameters {
            wind_direction: 0.0,
            wind_speed: 2.0,
            ..SimulationParameters::default()
        };
        let force = east.wind_force(1.5);
        assert_abs_diff_eq!(force.x, 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(force.y, 0.0, epsilon = 1e-6);

        let north = SimulationParameters {
            wind_direction: 90.0,
            ..east
        };
        let force = north.wind_force(1.0);
        assert_abs_diff_eq!(force.x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(force.y, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_medium_scaling() {
        let params = SimulationParameters {
            viscosity: 0.2,
            diffusion_rate: 0.4,
            medium: Medium::Water,
            ..SimulationParameters::default()
        };
        assert_abs_diff_eq!(params.effective_viscosity(), 0.8);
        assert_abs_diff_eq!(params.effective_diffusion(), 0.1);
    }
}
