//! Virtual Muscle actuator.
//!
//! [`Muscle`] ties recruitment, activation dynamics, contraction mechanics
//! and the tendon together. It owns only immutable, precomputed data; the
//! continuous state lives in a [`MuscleState`] owned by the host.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!   activation ──►│ recruitment ──► activation ──► FL·FV·FPE ──► Fce ─┐  │
//!   frequency ───►│  (fenv per       dynamics      per fiber          │  │──► Fse
//!                 │   unit)          (Af per unit)  type              ▼  │──► d(state)/dt
//!   path length ─►│────────────────────────────────────────── tendon ─ mass│
//!                 └──────────────────────────────────────────────────────┘
//! ```
//!
//! Each step the host calls [`Muscle::evaluate`] once with the committed
//! state: a degenerate fascicle length is repaired and the activation-filter
//! rates are refreshed and stored in the state. Integrators then query
//! [`Muscle::derivatives`] at trial states, which never modifies its argument
//! and keeps the stored rates for the whole step.
//!
//! # Usage
//!
//! ```
//! use sim_virtual_muscle::{Muscle, MuscleConfig, MuscleInput};
//!
//! let muscle = Muscle::new(MuscleConfig::default())?;
//! let mut state = muscle.initial_state(0.09);
//!
//! let input = MuscleInput::new(0.5, 0.09);
//! let step = muscle.evaluate(&mut state, &input)?;
//!
//! assert!(step.outputs.tendon_force > 0.0);
//! assert_eq!(step.derivative.units.len(), muscle.motor_unit_count());
//! # Ok::<(), sim_virtual_muscle::MuscleError>(())
//! ```

use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::activation::{ActivationDynamics, FilterPhase, filter_derivatives};
use crate::apportion::apportion;
use crate::config::{MuscleConfig, OutputSelection, RecruitmentType};
use crate::curves::FiberCurves;
use crate::error::{MuscleError, Result};
use crate::musculotendon::Musculotendon;
use crate::recruitment::{RecruitmentModel, activation_level_derivative};
use crate::state::{MotorUnitState, MuscleState};

/// Inputs sampled by the muscle at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MuscleInput {
    /// Neural activation, nominally in `[0, 1]`.
    pub activation: f64,

    /// Musculotendon path length (m).
    pub path_length: f64,

    /// Stimulation frequency (pulses/s). Only read under intramuscular
    /// stimulation, where a missing value counts as no stimulation.
    pub stimulation_frequency: Option<f64>,
}

impl MuscleInput {
    /// Natural drive at the given path length.
    #[must_use]
    pub fn new(activation: f64, path_length: f64) -> Self {
        Self {
            activation,
            path_length,
            stimulation_frequency: None,
        }
    }

    /// Set the stimulation frequency.
    #[must_use]
    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.stimulation_frequency = Some(frequency);
        self
    }

    fn frequency(&self) -> f64 {
        self.stimulation_frequency.unwrap_or(0.0)
    }
}

/// Values reported on the output ports.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MuscleOutputs {
    /// Tendon force (N).
    pub tendon_force: f64,
    /// Activation input, echoed.
    pub activation: f64,
    /// Tendon force divided by the maximal isometric force.
    pub normalized_force: f64,
    /// Normalized fascicle length (L0).
    pub fascicle_length: f64,
    /// Normalized fascicle velocity (L0/s).
    pub fascicle_velocity: f64,
}

impl MuscleOutputs {
    /// Output vector in port order: tendon force, then every selected
    /// optional output.
    #[must_use]
    pub fn ports(&self, selection: &OutputSelection) -> Vec<f64> {
        let optional = [
            (selection.activation, self.activation),
            (selection.normalized_force, self.normalized_force),
            (selection.fascicle_length, self.fascicle_length),
            (selection.fascicle_velocity, self.fascicle_velocity),
        ];

        std::iter::once(self.tendon_force)
            .chain(optional.into_iter().filter(|(on, _)| *on).map(|(_, v)| v))
            .collect()
    }
}

/// Mechanics of one fiber type at the current instant.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FiberDiagnostics {
    /// Force-length multiplier.
    pub force_length: f64,
    /// Force-velocity multiplier.
    pub force_velocity: f64,
    /// Contractile multiplier per unit activation: `FL·FV`, plus FPE2 under
    /// natural recruitment.
    pub contractile: f64,
    /// Activation-frequency exponent.
    pub frequency_exponent: f64,
    /// PCSA-weighted activation of the fiber type.
    pub activation: f64,
}

/// Intermediate quantities of one evaluation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MuscleDiagnostics {
    /// Tendon force (N).
    pub tendon_force: f64,
    /// Fascicle force (N), clamped at zero.
    pub fascicle_force: f64,
    /// FPE1 (F0 units).
    pub parallel_elastic: f64,
    /// FPE2 (F0 units).
    pub compression_elastic: f64,
    /// Per-fiber-type mechanics.
    pub fiber_types: Vec<FiberDiagnostics>,
    /// Firing rate of every unit (f0.5 units).
    pub excitations: Vec<f64>,
    /// Activation `Af_op` of every unit.
    pub unit_activations: Vec<f64>,
    /// Activation-filter rate of every unit (1/s).
    pub filter_rates: Vec<f64>,
}

/// Result of one muscle evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct MuscleStep {
    /// Output port values.
    pub outputs: MuscleOutputs,
    /// Time derivative of the state. The rate slots are always zero.
    pub derivative: MuscleState,
    /// Intermediate quantities.
    pub diagnostics: MuscleDiagnostics,
    /// Whether the state was reinitialized before evaluation.
    pub reinitialized: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct FiberModel {
    curves: FiberCurves,
    dynamics: ActivationDynamics,
    units: Range<usize>,
}

/// Where the activation-filter rate of each unit comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateSource {
    /// Pick the rise or fall rate from the evaluated state.
    Select,
    /// Use the rate slot written by the last committed evaluation, selecting
    /// afresh only for units whose slot is still empty.
    Committed,
}

/// A Virtual Muscle actuator.
#[derive(Debug, Clone, PartialEq)]
pub struct Muscle {
    config: MuscleConfig,
    musculotendon: Musculotendon,
    unit_pcsa: Vec<f64>,
    recruitment: RecruitmentModel,
    fibers: Vec<FiberModel>,
}

impl Muscle {
    /// Build a muscle from its configuration.
    ///
    /// Validates the configuration, apportions motor-unit PCSA and derives
    /// every per-run constant.
    pub fn new(config: MuscleConfig) -> Result<Self> {
        config.validate()?;

        let musculotendon = Musculotendon::new(&config)?;
        let unit_pcsa = apportion(&config.fiber_types, &config.apportionment);
        let recruitment = RecruitmentModel::new(&config, &unit_pcsa);

        let mut start = 0;
        let fibers = config
            .fiber_types
            .iter()
            .map(|fiber| {
                let units = start..start + fiber.motor_units;
                start = units.end;
                FiberModel {
                    curves: FiberCurves::from_fiber(fiber),
                    dynamics: ActivationDynamics::from_fiber(fiber, config.numeric_guard),
                    units,
                }
            })
            .collect();

        info!(
            fiber_types = config.fiber_type_count(),
            motor_units = unit_pcsa.len(),
            max_force = musculotendon.max_force,
            max_fascicle_length = musculotendon.max_fascicle_length,
            recruitment = ?config.recruitment,
            "built virtual muscle"
        );

        Ok(Self {
            config,
            musculotendon,
            unit_pcsa,
            recruitment,
            fibers,
        })
    }

    /// The configuration this muscle was built from.
    #[must_use]
    pub fn config(&self) -> &MuscleConfig {
        &self.config
    }

    /// Musculotendon constants.
    #[must_use]
    pub fn musculotendon(&self) -> &Musculotendon {
        &self.musculotendon
    }

    /// Recruitment thresholds and ranges.
    #[must_use]
    pub fn recruitment(&self) -> &RecruitmentModel {
        &self.recruitment
    }

    /// Physiological cross-sectional area (cm²).
    #[must_use]
    pub fn pcsa(&self) -> f64 {
        self.musculotendon.pcsa
    }

    /// Maximal isometric force F0 (N).
    #[must_use]
    pub fn max_isometric_force(&self) -> f64 {
        self.musculotendon.max_force
    }

    /// Maximum normalized fascicle length (L0).
    #[must_use]
    pub fn max_fascicle_length(&self) -> f64 {
        self.musculotendon.max_fascicle_length
    }

    /// PCSA weight of every motor unit, fiber-type-major.
    #[must_use]
    pub fn unit_pcsa(&self) -> &[f64] {
        &self.unit_pcsa
    }

    /// Total number of motor units.
    #[must_use]
    pub fn motor_unit_count(&self) -> usize {
        self.unit_pcsa.len()
    }

    /// Length of the flat state vector.
    #[must_use]
    pub fn state_len(&self) -> usize {
        MuscleState::flat_len(self.motor_unit_count())
    }

    /// Number of output ports.
    #[must_use]
    pub fn output_count(&self) -> usize {
        self.config.outputs.port_count()
    }

    /// Fascicle length (m) a freshly initialized state takes for a path (m).
    #[must_use]
    pub fn initial_fascicle_length(&self, path_length: f64) -> f64 {
        self.musculotendon.initial_fascicle_length(path_length)
    }

    /// Resting state at the given path length (m).
    ///
    /// Yield starts at 1, sag at its low-rate level and the activation
    /// filters empty.
    #[must_use]
    pub fn initial_state(&self, path_length: f64) -> MuscleState {
        let units = self
            .fibers
            .iter()
            .flat_map(|fiber| {
                let unit = MotorUnitState::at_rest(fiber.dynamics.resting_sag());
                std::iter::repeat_n(unit, fiber.units.len())
            })
            .collect();

        let mut state = MuscleState {
            units,
            fascicle_velocity: 0.0,
            fascicle_length: 0.0,
            activation_level: 0.0,
        };
        self.reinitialize(&mut state, path_length);
        state
    }

    /// Reset the fascicle states for the given path (m).
    ///
    /// Velocity and activation level go to zero and the fascicle length to
    /// [`initial_fascicle_length`](Self::initial_fascicle_length). Motor-unit
    /// states and the apportioned weights are untouched.
    pub fn reinitialize(&self, state: &mut MuscleState, path_length: f64) {
        state.fascicle_velocity = 0.0;
        state.fascicle_length = self.initial_fascicle_length(path_length);
        state.activation_level = 0.0;
    }

    /// Evaluate the committed state of the current step.
    ///
    /// Reinitializes the state if its fascicle length is not positive, then
    /// selects the rise or fall rate of every unit and stores it in the
    /// state's rate slot. Integrate from the updated state: the stored rates
    /// hold for every trial state of the step.
    pub fn evaluate(&self, state: &mut MuscleState, input: &MuscleInput) -> Result<MuscleStep> {
        self.check_units(state)?;

        let reinitialized = state.needs_reinitialization();
        if reinitialized {
            debug!(
                fascicle_length = state.fascicle_length,
                path_length = input.path_length,
                "fascicle length not positive, reinitializing"
            );
            self.reinitialize(state, input.path_length);
        }

        let mut step = self.assemble(state, input, RateSource::Select);
        for (unit, rate) in state.units.iter_mut().zip(&step.diagnostics.filter_rates) {
            unit.rate = *rate;
        }
        step.reinitialized = reinitialized;
        Ok(step)
    }

    /// Time derivative of `state` under `input`.
    ///
    /// Does not modify the state. The activation filters run at the rate
    /// stored by [`evaluate`](Self::evaluate); a unit whose rate slot is 0
    /// selects its rate from `state`. A state with a degenerate fascicle
    /// length is evaluated as if it had been reinitialized.
    pub fn derivatives(&self, state: &MuscleState, input: &MuscleInput) -> Result<MuscleState> {
        Ok(self.step_from(state, input)?.derivative)
    }

    /// Output port values for `state` under `input`.
    pub fn outputs(&self, state: &MuscleState, input: &MuscleInput) -> Result<MuscleOutputs> {
        Ok(self.step_from(state, input)?.outputs)
    }

    /// Full evaluation of `state` without modifying it.
    pub fn step_from(&self, state: &MuscleState, input: &MuscleInput) -> Result<MuscleStep> {
        self.check_units(state)?;

        if state.needs_reinitialization() {
            let mut repaired = state.clone();
            self.reinitialize(&mut repaired, input.path_length);
            let mut step = self.assemble(&repaired, input, RateSource::Committed);
            step.reinitialized = true;
            return Ok(step);
        }
        Ok(self.assemble(state, input, RateSource::Committed))
    }

    fn check_units(&self, state: &MuscleState) -> Result<()> {
        let expected = self.motor_unit_count();
        if state.units.len() == expected {
            Ok(())
        } else {
            Err(MuscleError::state_length(
                MuscleState::flat_len(expected),
                MuscleState::flat_len(state.units.len()),
            ))
        }
    }

    fn assemble(
        &self,
        state: &MuscleState,
        input: &MuscleInput,
        rates: RateSource,
    ) -> MuscleStep {
        let mt = &self.musculotendon;
        let kind = self.recruitment.kind();
        let stimulated = kind.uses_frequency();

        let lce = mt.normalized_length(state.fascicle_length);
        let vce = mt.normalized_velocity(state.fascicle_velocity);
        let level = state.activation_level;

        let excitations = self
            .recruitment
            .excitations(input.activation, level, input.frequency());

        let n = self.motor_unit_count();
        let mut derivative = MuscleState::zeros(n);
        let mut unit_activations = vec![0.0; n];
        let mut filter_rates = vec![0.0; n];

        let fpe1 = mt.parallel.evaluate(lce, vce);
        let fpe2 = mt.compression.evaluate(lce);

        let mut fiber_types = Vec::with_capacity(self.fibers.len());
        for fiber in &self.fibers {
            let dynamics = &fiber.dynamics;
            for k in fiber.units.clone() {
                let unit = &state.units[k];
                let fenv = excitations[k];

                let drive = if stimulated { fenv } else { unit.feff };
                let af = dynamics.activation(lce, unit.yield_factor, unit.sag, drive);

                let rise = dynamics.rise_rate(lce, fenv);
                let fall = if stimulated {
                    dynamics.stimulated_fall_rate(lce, input.activation)
                } else {
                    dynamics.fall_rate(lce, af)
                };
                let rate = match rates {
                    RateSource::Committed if unit.rate > 0.0 => unit.rate,
                    _ => FilterPhase::of(unit.fint, unit.feff).select(rise, fall),
                };

                let target = if stimulated { input.activation } else { fenv };
                let (dfint, dfeff) = filter_derivatives(target, unit.fint, unit.feff, rate);

                derivative.units[k] = MotorUnitState {
                    yield_factor: dynamics.yield_derivative(unit.yield_factor, vce),
                    sag: dynamics.sag_derivative(unit.sag, drive),
                    fint: dfint,
                    feff: dfeff,
                    rate: 0.0,
                };
                unit_activations[k] = af;
                filter_rates[k] = rate;
            }

            let force_length = fiber.curves.fl.evaluate(lce);
            let force_velocity = fiber.curves.fv.evaluate(lce, vce);
            let active = force_length * force_velocity;
            let contractile = if stimulated { active } else { fpe2 + active };

            fiber_types.push(FiberDiagnostics {
                force_length,
                force_velocity,
                contractile,
                frequency_exponent: dynamics.frequency_exponent(lce),
                activation: self.weighted_activation(fiber, &unit_activations),
            });
        }

        let fascicle_force = self
            .fascicle_force(state, level, fpe1, fpe2, &fiber_types, &unit_activations)
            .max(0.0);
        let tendon_force = mt.tendon_force(input.path_length, lce);

        derivative.fascicle_velocity = mt.fascicle_acceleration(tendon_force, fascicle_force);
        derivative.fascicle_length = state.fascicle_velocity;
        derivative.activation_level = if kind.integrates_activation_level() {
            activation_level_derivative(input.activation, level)
        } else {
            0.0
        };

        MuscleStep {
            outputs: MuscleOutputs {
                tendon_force,
                activation: input.activation,
                normalized_force: tendon_force / mt.max_force,
                fascicle_length: lce,
                fascicle_velocity: vce,
            },
            derivative,
            diagnostics: MuscleDiagnostics {
                tendon_force,
                fascicle_force,
                parallel_elastic: fpe1,
                compression_elastic: fpe2,
                fiber_types,
                excitations,
                unit_activations,
                filter_rates,
            },
            reinitialized: false,
        }
    }

    /// `Σ Af·w` over the units of a fiber type.
    fn weighted_activation(&self, fiber: &FiberModel, unit_activations: &[f64]) -> f64 {
        fiber
            .units
            .clone()
            .map(|k| unit_activations[k] * self.unit_pcsa[k])
            .sum()
    }

    /// Fascicle force (N) before clamping.
    fn fascicle_force(
        &self,
        state: &MuscleState,
        level: f64,
        fpe1: f64,
        fpe2: f64,
        fiber_types: &[FiberDiagnostics],
        unit_activations: &[f64],
    ) -> f64 {
        let f0 = self.musculotendon.max_force;

        match self.recruitment.kind() {
            RecruitmentType::DiscreteNatural => {
                let active: f64 = fiber_types
                    .iter()
                    .map(|fiber| fiber.contractile * fiber.activation)
                    .sum();
                f0 * (fpe1 + active)
            }
            RecruitmentType::ContinuousNatural => {
                let shares = self.recruitment.level_shares(level);
                let active: f64 = self
                    .fibers
                    .iter()
                    .zip(fiber_types)
                    .zip(&shares)
                    .map(|((model, fiber), share)| {
                        let weight: f64 = self.unit_pcsa[model.units.clone()].iter().sum();
                        let mean = if weight > 0.0 {
                            fiber.activation / weight
                        } else {
                            0.0
                        };
                        mean * fiber.contractile * share
                    })
                    .sum();
                f0 * (fpe1 + level * active)
            }
            RecruitmentType::IntramuscularFes => {
                let mut active = 0.0;
                let mut recruited = 0.0;
                for (model, fiber) in self.fibers.iter().zip(fiber_types) {
                    for k in model.units.clone() {
                        let weighted = unit_activations[k] * self.unit_pcsa[k];
                        active += state.units[k].feff * weighted * fiber.contractile;
                        recruited += weighted;
                    }
                }
                f0 * (active + (fpe1 + fpe2 * recruited).max(0.0))
            }
        }
    }
}
