//! Pollution sources
//!
//! Sources are owned by the caller and passed to every step by reference. The
//! core only reads them: each active source adds its per-tick amount to the
//! injection grid, which both backends then apply cell by cell.

use crate::grid::{FieldData, ObstacleMask};
use serde::{Deserialize, Serialize};

/// Emission profile of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceKind {
    /// Stack or factory outlet
    #[default]
    Industrial,
    /// Road traffic
    Vehicular,
    /// Domestic heating and small combustion
    Residential,
    /// Accidental release (chemical or oil spill)
    Spill,
}

impl SourceKind {
    /// Multiplier applied to the global release rate
    #[must_use]
    pub const fn emission_factor(self) -> f32 {
        match self {
            Self::Industrial => 1.0,
            Self::Vehicular => 0.6,
            Self::Residential => 0.3,
            Self::Spill => 1.5,
        }
    }
}

/// A point emitter on the grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollutionSource {
    /// Cell column, `[0, N)`
    pub x: usize,
    /// Cell row, `[0, N)`
    pub y: usize,
    /// Emission profile
    pub kind: SourceKind,
    /// Units per tick, replacing `release_rate * kind.emission_factor()`
    pub release_override: Option<f32>,
    /// Inactive sources are skipped
    pub active: bool,
}

impl PollutionSource {
    /// Active industrial source at `(x, y)` using the global release rate
    #[must_use]
    pub fn new(x: usize, y: usize) -> Self {
        Self {
            x,
            y,
            kind: SourceKind::Industrial,
            release_override: None,
            active: true,
        }
    }

    /// Set the emission profile
    #[must_use]
    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Release a fixed amount per tick regardless of the global rate
    #[must_use]
    pub fn with_release(mut self, amount: f32) -> Self {
        self.release_override = Some(amount);
        self
    }

    /// Amount released this tick; never negative, zero when inactive
    #[must_use]
    pub fn amount(&self, release_rate: f32) -> f32 {
        if !self.active {
            return 0.0;
        }
        let amount = self
            .release_override
            .unwrap_or(release_rate * self.kind.emission_factor());
        if amount.is_finite() {
            amount.max(0.0)
        } else {
            0.0
        }
    }
}

/// Accumulate the per-cell amounts released this tick into `injection`
///
/// Sources outside the grid are ignored. Sources on the ghost ring are moved
/// one cell inward, since the boundary pass would overwrite an edge cell.
/// Obstacle cells never receive pollutant.
pub fn build_injection(
    injection: &mut FieldData,
    sources: &[PollutionSource],
    release_rate: f32,
    obstacles: &ObstacleMask,
) {
    injection.fill(0.0);
    let n = injection.size();
    if n < 3 {
        return;
    }

    for source in sources {
        if source.x >= n || source.y >= n {
            continue;
        }
        let amount = source.amount(release_rate);
        if amount <= 0.0 {
            continue;
        }
        let x = source.x.clamp(1, n - 2);
        let y = source.y.clamp(1, n - 2);
        if obstacles.is_blocked(x, y) {
            continue;
        }
        let idx = injection.index(x, y);
        injection.as_mut_slice()[idx] += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_uses_override_then_profile() {
        let source = PollutionSource::new(3, 3).with_kind(SourceKind::Vehicular);
        assert!((source.amount(100.0) - 60.0).abs() < 1e-4);

        let source = source.with_release(12.0);
        assert_eq!(source.amount(100.0), 12.0);
    }

    #[test]
    fn test_inactive_and_negative_sources_release_nothing() {
        let mut source = PollutionSource::new(3, 3);
        source.active = false;
        assert_eq!(source.amount(100.0), 0.0);

        let source = PollutionSource::new(3, 3).with_release(-5.0);
        assert_eq!(source.amount(100.0), 0.0);
    }

    #[test]
    fn test_build_injection_sums_and_skips() {
        let mut injection = FieldData::new(8);
        let mut mask = ObstacleMask::new(8);
        mask.set(5, 5, true);

        let sources = [
            PollutionSource::new(2, 2).with_release(10.0),
            PollutionSource::new(2, 2).with_release(5.0),
            PollutionSource::new(5, 5).with_release(10.0),
            PollutionSource::new(40, 2).with_release(10.0),
            PollutionSource::new(0, 4).with_release(7.0),
        ];
        build_injection(&mut injection, &sources, 0.0, &mask);

        assert_eq!(injection.get(2, 2), 15.0);
        assert_eq!(injection.get(5, 5), 0.0);
        // Edge source moved one cell inward
        assert_eq!(injection.get(1, 4), 7.0);
        assert_eq!(injection.get(0, 4), 0.0);
        assert!((injection.interior_sum() - 22.0).abs() < 1e-6);
    }
}
