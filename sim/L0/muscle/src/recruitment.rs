//! Motor-unit recruitment.
//!
//! Recruitment turns the muscle's drive into a firing rate for every motor
//! unit, expressed in units of the fiber type's half-maximal frequency f0.5.
//! Three schemes are supported, fixed for a simulation run:
//!
//! - [`RecruitmentType::DiscreteNatural`]: units are walked in size order
//!   and each one is recruited once activation reaches its threshold. The
//!   threshold of a unit is proportional to the PCSA recruited before and
//!   including it.
//! - [`RecruitmentType::ContinuousNatural`]: fiber types are recruited as
//!   blocks, driven by the smoothed activation level `U`.
//! - [`RecruitmentType::IntramuscularFes`]: every unit fires at the
//!   stimulation frequency.
//!
//! Above threshold the firing rate is affine in the drive:
//!
//! ```text
//! fenv = (Fmax - Fmin) / (1 - th) · (a - th) + Fmin
//! ```
//!
//! so a unit starts firing at `Fmin` and reaches `Fmax` at full drive.

use crate::config::{MuscleConfig, NumericGuard, RecruitmentType};

/// Lowest recruitment threshold.
pub const MIN_THRESHOLD: f64 = 0.001;

/// Time constant of the activation level while activation rises (s).
pub const LEVEL_RISE_TIME: f64 = 0.03;

/// Time constant of the activation level while activation falls (s).
pub const LEVEL_FALL_TIME: f64 = 0.15;

/// Firing rate (f0.5 units) of a unit with the given threshold and range.
///
/// Zero below threshold. A threshold at or above 1 leaves no room for the
/// affine ramp; the unit then fires at `f_min` once recruited.
#[must_use]
pub fn firing_rate(drive: f64, threshold: f64, f_min: f64, f_max: f64) -> f64 {
    if drive < threshold {
        return 0.0;
    }
    let span = 1.0 - threshold;
    if span <= 0.0 {
        return f_min;
    }
    (f_max - f_min) / span * (drive - threshold) + f_min
}

/// Derivative of the smoothed activation level `U`.
#[must_use]
pub fn activation_level_derivative(activation: f64, level: f64) -> f64 {
    let error = activation - level;
    if error >= 0.0 {
        error / LEVEL_RISE_TIME
    } else {
        error / LEVEL_FALL_TIME
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FiberRecruitment {
    units: usize,
    f_half: f64,
    f_min: f64,
    f_max: f64,
}

/// Precomputed recruitment thresholds and firing ranges of one muscle.
#[derive(Debug, Clone, PartialEq)]
pub struct RecruitmentModel {
    kind: RecruitmentType,
    guard: NumericGuard,
    fibers: Vec<FiberRecruitment>,
    /// Per unit (discrete), per fiber type (continuous), empty (FES).
    thresholds: Vec<f64>,
}

impl RecruitmentModel {
    /// Build the recruitment model from a validated configuration and the
    /// apportioned unit weights.
    #[must_use]
    pub fn new(config: &MuscleConfig, unit_pcsa: &[f64]) -> Self {
        let fibers = config
            .fiber_types
            .iter()
            .map(|fiber| FiberRecruitment {
                units: fiber.motor_units,
                f_half: fiber.f_half,
                f_min: fiber.f_min,
                f_max: fiber.f_max,
            })
            .collect();

        let thresholds = match config.recruitment {
            RecruitmentType::DiscreteNatural => unit_pcsa
                .iter()
                .scan(0.0, |recruited, w| {
                    *recruited += w;
                    Some((*recruited * config.ur).max(MIN_THRESHOLD))
                })
                .collect(),
            RecruitmentType::ContinuousNatural => config
                .fiber_types
                .iter()
                .scan(0.0, |preceding, fiber| {
                    let threshold = (*preceding * config.ur).max(MIN_THRESHOLD);
                    *preceding += fiber.fractional_pcsa;
                    Some(threshold)
                })
                .collect(),
            RecruitmentType::IntramuscularFes => Vec::new(),
        };

        Self {
            kind: config.recruitment,
            guard: config.numeric_guard,
            fibers,
            thresholds,
        }
    }

    /// Recruitment scheme.
    #[must_use]
    pub fn kind(&self) -> RecruitmentType {
        self.kind
    }

    /// Recruitment thresholds: one per unit for discrete recruitment, one
    /// per fiber type for continuous recruitment, none under stimulation.
    #[must_use]
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Firing rate of every motor unit, fiber-type-major.
    ///
    /// `activation` drives discrete recruitment, `level` (the integrated
    /// activation level) drives continuous recruitment and `frequency`
    /// (pulses/s) drives stimulation.
    #[must_use]
    pub fn excitations(&self, activation: f64, level: f64, frequency: f64) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.fibers.iter().map(|f| f.units).sum());

        match self.kind {
            RecruitmentType::DiscreteNatural => {
                let mut thresholds = self.thresholds.iter();
                for fiber in &self.fibers {
                    for threshold in thresholds.by_ref().take(fiber.units) {
                        out.push(firing_rate(activation, *threshold, fiber.f_min, fiber.f_max));
                    }
                }
            }
            RecruitmentType::ContinuousNatural => {
                for (fiber, threshold) in self.fibers.iter().zip(&self.thresholds) {
                    let rate = firing_rate(level, *threshold, fiber.f_min, fiber.f_max);
                    out.extend(std::iter::repeat_n(rate, fiber.units));
                }
            }
            RecruitmentType::IntramuscularFes => {
                for fiber in &self.fibers {
                    let rate = frequency / fiber.f_half;
                    out.extend(std::iter::repeat_n(rate, fiber.units));
                }
            }
        }

        if self.guard == NumericGuard::Clamp {
            for rate in &mut out {
                *rate = rate.max(0.0);
            }
        }
        out
    }

    /// Share of the recruited drive held by each fiber type under continuous
    /// recruitment.
    ///
    /// Each recruited type contributes `level - threshold`, normalized by the
    /// sum over recruited types. Before the first type is recruited every
    /// share is zero.
    #[must_use]
    pub fn level_shares(&self, level: f64) -> Vec<f64> {
        let excess: Vec<f64> = self
            .thresholds
            .iter()
            .map(|th| if level >= *th { level - th } else { 0.0 })
            .collect();
        let total: f64 = excess.iter().sum();
        let denominator = if total == 0.0 { 1.0 } else { total };
        excess.into_iter().map(|e| e / denominator).collect()
    }
}
