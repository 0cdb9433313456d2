//! Motor-unit activation dynamics.
//!
//! Each motor unit turns its firing rate into an activation level through a
//! two-stage low-pass filter followed by the activation-frequency
//! nonlinearity. The filter stages (`fint`, `feff`) have asymmetric rise and
//! fall time constants that depend on fascicle length, and the output is
//! further modulated by two slow processes:
//!
//! - **Yield**: a transient loss of force after movement in slow fibers.
//! - **Sag**: a drop of force during sustained high-rate firing in fast fibers.
//!
//! # Model
//!
//! ```text
//! nf    = nf0 + nf1·(1/Lce - 1)
//! Af_op = 1 - exp(-(Y·Sg·feff / (af·nf))^nf)
//!
//! rise  = 1 / (Tf1·Lce² + Tf2·fenv)          when fint - feff >= 0
//! fall  = Lce / (Tf3 + Tf4·Af_op)             otherwise
//!
//! dfint/dt = (fenv - fint)·rate
//! dfeff/dt = (fint - feff)·rate
//! ```
//!
//! Under intramuscular stimulation every unit fires at the stimulation rate,
//! so the activation-frequency law reads the excitation `f/f0.5` directly,
//! the first filter stage tracks the activation input, and the fall rate
//! only distinguishes stimulation on from stimulation off.
//!
//! # References
//!
//! - Brown, I.E., Loeb, G.E. (2000). Measured and modeled properties of
//!   mammalian skeletal muscle: IV. Dynamics of activation and deactivation.
//! - Song, D., Raphael, G., Lan, N., Loeb, G.E. (2008). Computationally
//!   efficient models of neuromuscular recruitment and mechanics.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{FiberTypeConfig, NumericGuard};

/// Yield is active for fiber types whose `c_y` exceeds this value.
pub const YIELD_THRESHOLD: f64 = 0.001;

/// Drive above which sag settles towards its high-rate level.
pub const SAG_THRESHOLD: f64 = 0.1;

/// Inverse time constant of the yield process (1/s).
pub const YIELD_RATE: f64 = 5.0;

const MIN_EXPONENT: f64 = 0.01;
const MIN_LENGTH: f64 = 0.01;
const MS: f64 = 1e-3;

/// Activation parameters of one fiber type, with time constants in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActivationDynamics {
    /// Activation-frequency scale.
    pub af: f64,
    /// Activation-frequency exponent at optimal length.
    pub nf0: f64,
    /// Length dependence of the exponent.
    pub nf1: f64,
    /// Rise time constant, length term (s).
    pub tf1: f64,
    /// Rise time constant, excitation term (s).
    pub tf2: f64,
    /// Fall time constant, constant term (s).
    pub tf3: f64,
    /// Fall time constant, activation term (s).
    pub tf4: f64,
    /// Yield magnitude.
    pub c_y: f64,
    /// Yield velocity scale (L0/s).
    pub v_y: f64,
    /// Sag level at low firing rates.
    pub a_s1: f64,
    /// Sag level at high firing rates.
    pub a_s2: f64,
    /// Sag time constant (s).
    pub t_s: f64,
    /// Out-of-domain policy.
    pub guard: NumericGuard,
}

impl ActivationDynamics {
    /// Extract the activation parameters of a fiber type.
    #[must_use]
    pub fn from_fiber(fiber: &FiberTypeConfig, guard: NumericGuard) -> Self {
        Self {
            af: fiber.af,
            nf0: fiber.nf0,
            nf1: fiber.nf1,
            tf1: fiber.tf1 * MS,
            tf2: fiber.tf2 * MS,
            tf3: fiber.tf3 * MS,
            tf4: fiber.tf4 * MS,
            c_y: fiber.c_y,
            v_y: fiber.v_y,
            a_s1: fiber.a_s1,
            a_s2: fiber.a_s2,
            t_s: fiber.t_s * MS,
            guard,
        }
    }

    /// Whether yield is modeled.
    #[must_use]
    pub fn has_yield(&self) -> bool {
        self.c_y > YIELD_THRESHOLD
    }

    /// Whether sag is modeled.
    #[must_use]
    pub fn has_sag(&self) -> bool {
        self.a_s1 != self.a_s2
    }

    /// Initial sag state of a resting unit: aS1, or 1 when sag is not
    /// modeled.
    #[must_use]
    pub fn resting_sag(&self) -> f64 {
        if self.has_sag() { self.a_s1 } else { 1.0 }
    }

    /// Yield factor that enters the force law. 1 when yield is not modeled.
    #[must_use]
    pub fn effective_yield(&self, state: f64) -> f64 {
        if self.has_yield() { state } else { 1.0 }
    }

    /// Sag factor that enters the force law. 1 when sag is not modeled.
    #[must_use]
    pub fn effective_sag(&self, state: f64) -> f64 {
        if self.has_sag() { state } else { 1.0 }
    }

    fn inverse_length(&self, lce: f64) -> f64 {
        match self.guard {
            NumericGuard::Clamp => 1.0 / lce.max(MIN_LENGTH),
            NumericGuard::Propagate => 1.0 / lce,
        }
    }

    /// Activation-frequency exponent `nf` at normalized length `lce`.
    #[must_use]
    pub fn frequency_exponent(&self, lce: f64) -> f64 {
        let nf = self.nf0 + self.nf1 * (self.inverse_length(lce) - 1.0);
        match self.guard {
            NumericGuard::Clamp => nf.max(MIN_EXPONENT),
            NumericGuard::Propagate => nf,
        }
    }

    /// Activation `Af_op` produced by a firing-rate drive (f0.5 units).
    ///
    /// `drive` is `feff` under natural recruitment and the excitation
    /// `f/f0.5` under intramuscular stimulation. `yield_factor` and `sag`
    /// are the raw states; they are replaced by 1 when not modeled.
    #[must_use]
    pub fn activation(&self, lce: f64, yield_factor: f64, sag: f64, drive: f64) -> f64 {
        let nf = self.frequency_exponent(lce);
        let drive = match self.guard {
            NumericGuard::Clamp => drive.max(0.0),
            NumericGuard::Propagate => drive,
        };
        let base =
            self.effective_yield(yield_factor) * self.effective_sag(sag) * drive / (self.af * nf);
        let af = 1.0 - (-base.powf(nf)).exp();

        match self.guard {
            NumericGuard::Clamp if !af.is_finite() => 0.0,
            _ => af,
        }
    }

    /// Inverse time constant while the filter is rising.
    #[must_use]
    pub fn rise_rate(&self, lce: f64, excitation: f64) -> f64 {
        1.0 / (self.tf1 * lce * lce + self.tf2 * excitation)
    }

    /// Inverse time constant while the filter is falling under natural
    /// recruitment.
    #[must_use]
    pub fn fall_rate(&self, lce: f64, activation: f64) -> f64 {
        lce / (self.tf3 + self.tf4 * activation)
    }

    /// Inverse time constant while the filter is falling under stimulation.
    ///
    /// Only the presence of an activation command matters.
    #[must_use]
    pub fn stimulated_fall_rate(&self, lce: f64, activation_input: f64) -> f64 {
        let on = if activation_input > 0.0 { 1.0 } else { 0.0 };
        lce / (self.tf3 + self.tf4 * on)
    }

    /// Yield derivative. Zero when yield is not modeled.
    #[must_use]
    pub fn yield_derivative(&self, yield_factor: f64, vce: f64) -> f64 {
        if !self.has_yield() {
            return 0.0;
        }
        let target = 1.0 - self.c_y * (1.0 - (-vce.abs() / self.v_y).exp());
        YIELD_RATE * (target - yield_factor)
    }

    /// Sag derivative. Zero when sag is not modeled.
    ///
    /// Sag settles towards `a_s2` while `drive` exceeds [`SAG_THRESHOLD`]
    /// and towards `a_s1` otherwise.
    #[must_use]
    pub fn sag_derivative(&self, sag: f64, drive: f64) -> f64 {
        if !self.has_sag() {
            return 0.0;
        }
        let target = if drive > SAG_THRESHOLD {
            self.a_s2
        } else {
            self.a_s1
        };
        (target - sag) / self.t_s
    }
}

/// Which filter time constant is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPhase {
    /// `fint >= feff`.
    Rising,
    /// `fint < feff`.
    Falling,
}

impl FilterPhase {
    /// Select the phase from the two filter states.
    #[must_use]
    pub fn of(fint: f64, feff: f64) -> Self {
        if fint - feff >= 0.0 {
            Self::Rising
        } else {
            Self::Falling
        }
    }

    /// Pick the matching rate.
    #[must_use]
    pub fn select(self, rise: f64, fall: f64) -> f64 {
        match self {
            Self::Rising => rise,
            Self::Falling => fall,
        }
    }
}

/// Derivatives of the two filter stages.
///
/// `target` is the firing rate under natural recruitment and the activation
/// input under stimulation.
#[must_use]
pub fn filter_derivatives(target: f64, fint: f64, feff: f64, rate: f64) -> (f64, f64) {
    ((target - fint) * rate, (fint - feff) * rate)
}
