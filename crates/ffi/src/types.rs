//! C-compatible mirrors of the per-tick inputs

use plume_sim_core::{Medium, PollutionSource, SimulationParameters, SourceKind};

use crate::error::DefaultPlumeSimError;

/// C-compatible simulation parameters for one tick.
///
/// Out-of-range values are clamped by the engine, not rejected.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PlumeSimParams {
    /// Direction the wind blows towards, degrees (0 = +x, 90 = +y)
    pub wind_direction: f32,
    /// Wind speed
    pub wind_speed: f32,
    /// Kinematic viscosity
    pub viscosity: f32,
    /// Pollutant diffusion rate
    pub diffusion_rate: f32,
    /// Fraction of concentration kept each tick (0-1)
    pub decay_factor: f32,
    /// Multiplier on the base time step
    pub simulation_speed: f32,
    /// Units released per tick by sources without an override
    pub release_rate: f32,
    /// Carrier medium: 0=Air, 1=Water
    pub medium: u8,
}

impl From<SimulationParameters> for PlumeSimParams {
    fn from(params: SimulationParameters) -> Self {
        Self {
            wind_direction: params.wind_direction,
            wind_speed: params.wind_speed,
            viscosity: params.viscosity,
            diffusion_rate: params.diffusion_rate,
            decay_factor: params.decay_factor,
            simulation_speed: params.simulation_speed,
            release_rate: params.release_rate,
            medium: match params.medium {
                Medium::Air => 0,
                Medium::Water => 1,
            },
        }
    }
}

/// Convert caller parameters, rejecting an unknown medium code.
pub(crate) fn params_from_raw(
    params: &PlumeSimParams,
) -> Result<SimulationParameters, DefaultPlumeSimError> {
    let medium = match params.medium {
        0 => Medium::Air,
        1 => Medium::Water,
        other => return Err(DefaultPlumeSimError::invalid_code("medium", other, 1)),
    };
    Ok(SimulationParameters {
        wind_direction: params.wind_direction,
        wind_speed: params.wind_speed,
        viscosity: params.viscosity,
        diffusion_rate: params.diffusion_rate,
        decay_factor: params.decay_factor,
        simulation_speed: params.simulation_speed,
        release_rate: params.release_rate,
        medium,
    })
}

/// C-compatible pollution source.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PlumeSimSource {
    /// Cell column
    pub x: u32,
    /// Cell row
    pub y: u32,
    /// Emission profile: 0=Industrial, 1=Vehicular, 2=Residential, 3=Spill
    pub kind: u8,
    /// Use `release` instead of the global release rate
    pub has_release: bool,
    /// Units per tick when `has_release` is set
    pub release: f32,
    /// Inactive sources are skipped
    pub active: bool,
}

/// Convert a caller source, rejecting an unknown emission profile.
pub(crate) fn source_from_raw(source: &PlumeSimSource) -> Result<PollutionSource, DefaultPlumeSimError> {
    let kind = match source.kind {
        0 => SourceKind::Industrial,
        1 => SourceKind::Vehicular,
        2 => SourceKind::Residential,
        3 => SourceKind::Spill,
        other => return Err(DefaultPlumeSimError::invalid_code("kind", other, 3)),
    };
    let mut converted = PollutionSource::new(source.x as usize, source.y as usize).with_kind(kind);
    if source.has_release {
        converted = converted.with_release(source.release);
    }
    converted.active = source.active;
    Ok(converted)
}

/// Default parameters (light eastward wind, slow decay).
#[no_mangle]
pub extern "C" fn plume_sim_default_params() -> PlumeSimParams {
    SimulationParameters::default().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PlumeSimError, PlumeSimErrorCode};

    #[test]
    fn test_params_convert_both_ways() {
        let params = SimulationParameters {
            medium: Medium::Water,
            ..SimulationParameters::default()
        };
        let raw = PlumeSimParams::from(params);
        assert_eq!(raw.medium, 1);
        assert_eq!(params_from_raw(&raw), Ok(params));
    }

    #[test]
    fn test_unknown_medium_is_rejected() {
        let raw = PlumeSimParams {
            medium: 7,
            ..plume_sim_default_params()
        };
        let err = params_from_raw(&raw).expect_err("medium 7 is unknown");
        assert_eq!(err.code(), PlumeSimErrorCode::InvalidParameter);
        assert!(err.msg().contains("medium"));
    }

    #[test]
    fn test_source_conversion() {
        let raw = PlumeSimSource {
            x: 4,
            y: 9,
            kind: 3,
            has_release: true,
            release: 12.0,
            active: true,
        };
        let source = source_from_raw(&raw).expect("valid source");
        assert_eq!((source.x, source.y), (4, 9));
        assert_eq!(source.kind, SourceKind::Spill);
        assert_eq!(source.amount(50.0), 12.0);

        let unknown = PlumeSimSource { kind: 9, ..raw };
        assert!(source_from_raw(&unknown).is_err());

        let idle = PlumeSimSource { active: false, ..raw };
        assert_eq!(source_from_raw(&idle).expect("valid source").amount(50.0), 0.0);
    }
}
