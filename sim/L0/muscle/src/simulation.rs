//! Minimal host loop for a single muscle.
//!
//! [`MuscleSimulation`] owns a muscle, its flat state vector and the current
//! time. Each [`step`](MuscleSimulation::step) evaluates the committed state
//! once (outputs, reinitialization, rate selectors) and then advances the
//! state with the configured integrator while the inputs are held constant.
//!
//! ```
//! use sim_virtual_muscle::{Muscle, MuscleConfig, MuscleInput, MuscleSimulation};
//!
//! let muscle = Muscle::new(MuscleConfig::default())?;
//! let mut sim = MuscleSimulation::new(muscle, 0.09);
//!
//! let input = MuscleInput::new(0.8, 0.09);
//! for _ in 0..100 {
//!     sim.step(&input, 1e-4)?;
//! }
//! assert!(sim.time() > 0.0099);
//! # Ok::<(), sim_virtual_muscle::MuscleError>(())
//! ```

use nalgebra::DVector;

use crate::error::Result;
use crate::integrate::{ContinuousDynamics, IntegrationMethod, integrate_with_method};
use crate::muscle::{Muscle, MuscleInput, MuscleOutputs, MuscleStep};
use crate::state::MuscleState;

/// A muscle with its inputs frozen, seen as an ODE over the flat state.
#[derive(Debug, Clone, Copy)]
pub struct DrivenMuscle<'a> {
    /// The muscle.
    pub muscle: &'a Muscle,
    /// Inputs held for the duration of the step.
    pub input: MuscleInput,
}

impl ContinuousDynamics for DrivenMuscle<'_> {
    fn state_len(&self) -> usize {
        self.muscle.state_len()
    }

    fn derivatives(&self, x: &[f64], dx: &mut [f64]) -> Result<()> {
        let state = MuscleState::from_slice(self.muscle.motor_unit_count(), x)?;
        self.muscle.derivatives(&state, &self.input)?.write_to(dx)
    }
}

/// Single-muscle simulation driver.
#[derive(Debug, Clone)]
pub struct MuscleSimulation {
    muscle: Muscle,
    state: DVector<f64>,
    time: f64,
    method: IntegrationMethod,
}

impl MuscleSimulation {
    /// Start at rest at the given path length (m).
    #[must_use]
    pub fn new(muscle: Muscle, path_length: f64) -> Self {
        let state = muscle.initial_state(path_length).to_vector();
        Self {
            muscle,
            state,
            time: 0.0,
            method: IntegrationMethod::default(),
        }
    }

    /// Set the integration method.
    #[must_use]
    pub fn with_method(mut self, method: IntegrationMethod) -> Self {
        self.method = method;
        self
    }

    /// The simulated muscle.
    #[must_use]
    pub fn muscle(&self) -> &Muscle {
        &self.muscle
    }

    /// Simulated time (s).
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Flat state vector.
    #[must_use]
    pub fn state_vector(&self) -> &DVector<f64> {
        &self.state
    }

    /// Structured copy of the current state.
    pub fn state(&self) -> Result<MuscleState> {
        MuscleState::from_slice(self.muscle.motor_unit_count(), self.state.as_slice())
    }

    /// Overwrite the current state.
    pub fn set_state(&mut self, state: &MuscleState) -> Result<()> {
        state.write_to(self.state.as_mut_slice())
    }

    /// Advance by `dt` seconds with `input` held constant.
    ///
    /// Returns the evaluation of the committed state at the start of the
    /// step.
    pub fn step(&mut self, input: &MuscleInput, dt: f64) -> Result<MuscleStep> {
        let mut committed = self.state()?;
        let step = self.muscle.evaluate(&mut committed, input)?;
        committed.write_to(self.state.as_mut_slice())?;

        let driven = DrivenMuscle {
            muscle: &self.muscle,
            input: *input,
        };
        integrate_with_method(self.method, &driven, &mut self.state, dt)?;
        self.time += dt;

        Ok(step)
    }

    /// Run `steps` steps, sampling the input from the current time.
    ///
    /// Returns the outputs of every step.
    pub fn run(
        &mut self,
        steps: usize,
        dt: f64,
        mut input: impl FnMut(f64) -> MuscleInput,
    ) -> Result<Vec<MuscleOutputs>> {
        let mut outputs = Vec::with_capacity(steps);
        for _ in 0..steps {
            let sample = input(self.time);
            outputs.push(self.step(&sample, dt)?.outputs);
        }
        Ok(outputs)
    }
}
