//! Constitutive laws of the contraction mechanics and the tendon.
//!
//! All curves are stateless and evaluated from the normalized fascicle length
//! `Lce` (L0) and velocity `Vce` (L0/s). Nothing here is integrated.
//!
//! # Force-Length
//!
//! ```text
//! FL = exp(-|(Lce^β - 1) / ω|^ρ)
//! ```
//!
//! # Force-Velocity
//!
//! The lengthening and shortening branches are selected by the sign of the
//! velocity. The switch is a hard branch: both branches return 1 at
//! `Vce = 0` but their slopes differ.
//!
//! ```text
//! Vce >= 0:  FV = (bV - (aV0 + aV1·Lce + aV2·Lce²)·Vce) / (bV + Vce)
//! Vce <  0:  FV = (Vmax - Vce) / (Vmax + (cV0 + cV1·Lce)·Vce)
//! ```
//!
//! # Passive elements
//!
//! - FPE1 resists stretch over the whole length range and carries the
//!   viscosity of the muscle.
//! - FPE2 resists compression of thick filaments at short lengths. It is
//!   clamped so it never pulls.
//!
//! # References
//!
//! - Brown, I.E., Cheng, E.J., Loeb, G.E. (1999). Measured and modeled
//!   properties of mammalian skeletal muscle.
//! - Cheng, E.J., Brown, I.E., Loeb, G.E. (2000). Virtual Muscle: a
//!   computational approach to understanding the effects of muscle
//!   properties on motor control.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{FiberTypeConfig, MuscleConfig};

/// `ln(exp(x) + 1)` without overflow for large `x`.
#[must_use]
pub fn softplus(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// Inverse of [`softplus`]: `ln(exp(y) - 1)`, defined for `y > 0`.
#[must_use]
pub fn inverse_softplus(y: f64) -> f64 {
    y + (-(-y).exp()).ln_1p()
}

/// Active force-length curve of one fiber type.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForceLengthCurve {
    /// Width.
    pub omega: f64,
    /// Skew.
    pub beta: f64,
    /// Roundness.
    pub rho: f64,
}

impl ForceLengthCurve {
    /// Extract the force-length constants of a fiber type.
    #[must_use]
    pub fn from_fiber(fiber: &FiberTypeConfig) -> Self {
        Self {
            omega: fiber.fl_omega,
            beta: fiber.fl_beta,
            rho: fiber.fl_rho,
        }
    }

    /// Evaluate the force-length multiplier at normalized length `lce`.
    ///
    /// Peaks at 1 for `lce = 1`.
    #[must_use]
    pub fn evaluate(&self, lce: f64) -> f64 {
        let stretch = ((lce.powf(self.beta) - 1.0) / self.omega).abs();
        (-stretch.powf(self.rho)).exp()
    }
}

/// Which side of the force-velocity curve was evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityBranch {
    /// `Vce >= 0`.
    Lengthening,
    /// `Vce < 0`.
    Shortening,
}

impl VelocityBranch {
    /// Select the branch from the sign of the fascicle velocity.
    #[must_use]
    pub fn of(vce: f64) -> Self {
        if vce >= 0.0 {
            Self::Lengthening
        } else {
            Self::Shortening
        }
    }
}

/// Force-velocity curve of one fiber type.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForceVelocityCurve {
    /// Maximum shortening velocity (negative, L0/s).
    pub v_max: f64,
    /// Shortening coefficient.
    pub cv0: f64,
    /// Length dependence of the shortening coefficient.
    pub cv1: f64,
    /// Lengthening coefficient.
    pub av0: f64,
    /// Linear length term of the lengthening coefficient.
    pub av1: f64,
    /// Quadratic length term of the lengthening coefficient.
    pub av2: f64,
    /// Lengthening curvature.
    pub bv: f64,
}

impl ForceVelocityCurve {
    /// Extract the force-velocity constants of a fiber type.
    #[must_use]
    pub fn from_fiber(fiber: &FiberTypeConfig) -> Self {
        Self {
            v_max: fiber.v_max,
            cv0: fiber.cv0,
            cv1: fiber.cv1,
            av0: fiber.av0,
            av1: fiber.av1,
            av2: fiber.av2,
            bv: fiber.bv,
        }
    }

    /// Lengthening (eccentric) branch.
    #[must_use]
    pub fn lengthening(&self, lce: f64, vce: f64) -> f64 {
        let a = self.av0 + self.av1 * lce + self.av2 * lce * lce;
        (self.bv - a * vce) / (self.bv + vce)
    }

    /// Shortening (concentric) branch.
    #[must_use]
    pub fn shortening(&self, lce: f64, vce: f64) -> f64 {
        (self.v_max - vce) / (self.v_max + (self.cv0 + self.cv1 * lce) * vce)
    }

    /// Evaluate the force-velocity multiplier.
    #[must_use]
    pub fn evaluate(&self, lce: f64, vce: f64) -> f64 {
        match VelocityBranch::of(vce) {
            VelocityBranch::Lengthening => self.lengthening(lce, vce),
            VelocityBranch::Shortening => self.shortening(lce, vce),
        }
    }
}

/// Parallel elastic element active over the whole length range (FPE1).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParallelElasticCurve {
    /// Viscous damping (F0 per L0/s).
    pub viscosity: f64,
    /// Scale.
    pub c1: f64,
    /// Curvature.
    pub k1: f64,
    /// Rest length relative to the maximum fascicle length.
    pub lr1: f64,
    /// Maximum fascicle length (L0).
    pub max_length: f64,
}

impl ParallelElasticCurve {
    /// Build FPE1 for a muscle whose maximum fascicle length is known.
    #[must_use]
    pub fn new(config: &MuscleConfig, max_length: f64) -> Self {
        Self {
            viscosity: config.viscosity,
            c1: config.c1,
            k1: config.k1,
            lr1: config.lr1,
            max_length,
        }
    }

    /// Elastic part only, as a function of length relative to `max_length`.
    #[must_use]
    pub fn elastic(&self, relative_length: f64) -> f64 {
        self.c1 * self.k1 * softplus((relative_length - self.lr1) / self.k1)
    }

    /// Passive force (F0 units) at normalized length and velocity.
    #[must_use]
    pub fn evaluate(&self, lce: f64, vce: f64) -> f64 {
        self.viscosity * vce + self.elastic(lce / self.max_length)
    }
}

/// Thick-filament compression element (FPE2). Never positive.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompressionElasticCurve {
    /// Scale.
    pub c2: f64,
    /// Curvature.
    pub k2: f64,
    /// Rest length (L0).
    pub lr2: f64,
}

impl CompressionElasticCurve {
    /// Extract FPE2 constants from the muscle configuration.
    #[must_use]
    pub fn new(config: &MuscleConfig) -> Self {
        Self {
            c2: config.c2,
            k2: config.k2,
            lr2: config.lr2,
        }
    }

    /// Passive force (F0 units), clamped to `<= 0`.
    #[must_use]
    pub fn evaluate(&self, lce: f64) -> f64 {
        (self.c2 * ((self.k2 * (lce - self.lr2)).exp() - 1.0)).min(0.0)
    }
}

/// Series elastic element (tendon).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeriesElasticCurve {
    /// Scale.
    pub c_t: f64,
    /// Curvature.
    pub k_t: f64,
    /// Rest length (L0T).
    pub lr_t: f64,
}

impl SeriesElasticCurve {
    /// Extract tendon constants from the muscle configuration.
    #[must_use]
    pub fn new(config: &MuscleConfig) -> Self {
        Self {
            c_t: config.c_t,
            k_t: config.k_t,
            lr_t: config.lr_t,
        }
    }

    /// Tendon force (F0 units) at normalized tendon length (L0T).
    ///
    /// Smooth one-sided spring: near zero when slack, asymptotically linear
    /// with slope `c_t` when stretched.
    #[must_use]
    pub fn evaluate(&self, tendon_length: f64) -> f64 {
        self.c_t * self.k_t * softplus((tendon_length - self.lr_t) / self.k_t)
    }

    /// Normalized tendon length carrying `force` (F0 units, `> 0`).
    #[must_use]
    pub fn length_at(&self, force: f64) -> f64 {
        self.k_t * inverse_softplus(force / (self.c_t * self.k_t)) + self.lr_t
    }
}

/// Force-length and force-velocity curves of one fiber type.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FiberCurves {
    /// Force-length curve.
    pub fl: ForceLengthCurve,
    /// Force-velocity curve.
    pub fv: ForceVelocityCurve,
}

impl FiberCurves {
    /// Extract the curves of a fiber type.
    #[must_use]
    pub fn from_fiber(fiber: &FiberTypeConfig) -> Self {
        Self {
            fl: ForceLengthCurve::from_fiber(fiber),
            fv: ForceVelocityCurve::from_fiber(fiber),
        }
    }
}
