//! Continuous state of a Virtual Muscle.
//!
//! The host owns the state and advances it with its integrator; the muscle
//! only reads it and proposes derivatives. Internally the state is kept as
//! an array of per-unit structs, and it converts to and from the flat vector
//! layout expected by existing integration harnesses:
//!
//! ```text
//! [Y₀, Sg₀, fint₀, feff₀, rate₀,  Y₁, Sg₁, ...,  Vce, Lce, U]
//!  └────────── unit 0 ─────────┘  └ unit 1 ...    └─ fascicle ─┘
//! ```
//!
//! Units are numbered fiber-type-major. `Vce` and `Lce` are in m/s and m;
//! `U` is the integrated activation level (continuous natural recruitment
//! only, zero otherwise).

use nalgebra::DVector;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{MuscleError, Result};

/// Number of flat entries per motor unit.
pub const UNIT_STRIDE: usize = 5;

/// Number of flat entries after the motor-unit blocks.
pub const FASCICLE_STATES: usize = 3;

/// Continuous states of one motor unit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorUnitState {
    /// Yield factor. Held at 1 for fiber types without yield.
    pub yield_factor: f64,

    /// Sag factor. Held at 1 in the force law for fiber types without sag.
    pub sag: f64,

    /// Intermediate stage of the activation filter.
    pub fint: f64,

    /// Effective activation, output of the activation filter.
    pub feff: f64,

    /// Inverse time constant of the activation filter, recomputed every
    /// step from the sign of `fint - feff`. Never integrated.
    pub rate: f64,
}

impl MotorUnitState {
    /// Resting unit: no yield, sag at its low-rate level, filter empty.
    #[must_use]
    pub fn at_rest(sag: f64) -> Self {
        Self {
            yield_factor: 1.0,
            sag,
            fint: 0.0,
            feff: 0.0,
            rate: 0.0,
        }
    }

    /// All-zero entry, used for derivative vectors.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            yield_factor: 0.0,
            sag: 0.0,
            fint: 0.0,
            feff: 0.0,
            rate: 0.0,
        }
    }

    fn write(&self, out: &mut [f64]) {
        out[0] = self.yield_factor;
        out[1] = self.sag;
        out[2] = self.fint;
        out[3] = self.feff;
        out[4] = self.rate;
    }

    fn read(block: &[f64]) -> Self {
        Self {
            yield_factor: block[0],
            sag: block[1],
            fint: block[2],
            feff: block[3],
            rate: block[4],
        }
    }
}

/// Full continuous state of a muscle. Also used to hold derivatives.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MuscleState {
    /// Per-unit states, fiber-type-major.
    pub units: Vec<MotorUnitState>,

    /// Fascicle velocity (m/s).
    pub fascicle_velocity: f64,

    /// Fascicle length (m). A value `<= 0` marks the state as uninitialized.
    pub fascicle_length: f64,

    /// Integrated activation level (continuous natural recruitment).
    pub activation_level: f64,
}

impl MuscleState {
    /// A state whose fascicle length marks it as needing initialization.
    #[must_use]
    pub fn uninitialized(units: usize) -> Self {
        Self {
            units: vec![MotorUnitState::zero(); units],
            fascicle_velocity: 0.0,
            fascicle_length: 0.0,
            activation_level: 0.0,
        }
    }

    /// All-zero state of the given size.
    #[must_use]
    pub fn zeros(units: usize) -> Self {
        Self::uninitialized(units)
    }

    /// Flat length for `units` motor units.
    #[must_use]
    pub const fn flat_len(units: usize) -> usize {
        units * UNIT_STRIDE + FASCICLE_STATES
    }

    /// Number of motor units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Whether the fascicle length is degenerate and must be reinitialized.
    #[must_use]
    pub fn needs_reinitialization(&self) -> bool {
        self.fascicle_length <= 0.0
    }

    /// Parse a flat state vector.
    pub fn from_slice(units: usize, x: &[f64]) -> Result<Self> {
        let expected = Self::flat_len(units);
        if x.len() != expected {
            return Err(MuscleError::state_length(expected, x.len()));
        }

        let (blocks, tail) = x.split_at(units * UNIT_STRIDE);
        Ok(Self {
            units: blocks
                .chunks_exact(UNIT_STRIDE)
                .map(MotorUnitState::read)
                .collect(),
            fascicle_velocity: tail[0],
            fascicle_length: tail[1],
            activation_level: tail[2],
        })
    }

    /// Write into a flat state vector of matching length.
    pub fn write_to(&self, out: &mut [f64]) -> Result<()> {
        let expected = Self::flat_len(self.units.len());
        if out.len() != expected {
            return Err(MuscleError::state_length(expected, out.len()));
        }
        self.fill(out);
        Ok(())
    }

    /// Flatten into a column vector.
    #[must_use]
    pub fn to_vector(&self) -> DVector<f64> {
        let mut out = DVector::zeros(Self::flat_len(self.units.len()));
        self.fill(out.as_mut_slice());
        out
    }

    /// Write into a slice of exactly `flat_len` entries.
    fn fill(&self, out: &mut [f64]) {
        let (blocks, tail) = out.split_at_mut(self.units.len() * UNIT_STRIDE);
        for (unit, block) in self.units.iter().zip(blocks.chunks_exact_mut(UNIT_STRIDE)) {
            unit.write(block);
        }
        tail.copy_from_slice(&[
            self.fascicle_velocity,
            self.fascicle_length,
            self.activation_level,
        ]);
    }
}
