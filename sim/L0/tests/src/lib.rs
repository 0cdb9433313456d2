//! Shared fixtures for the Virtual Muscle integration tests.

use sim_virtual_muscle::{
    FiberTypeConfig, Muscle, MuscleConfig, MuscleInput, MuscleOutputs, MuscleSimulation, Result,
};

/// Musculotendon path length used by most scenarios (m).
pub const PATH: f64 = 0.09;

/// Host step for the default implicit integrator (s).
pub const DT: f64 = 1e-3;

/// Slow-twitch fibers without yield, so force follows the filters alone.
#[must_use]
pub fn steady_slow_twitch() -> FiberTypeConfig {
    let mut fiber = FiberTypeConfig::slow_twitch();
    fiber.c_y = 0.0;
    fiber
}

/// A muscle with a single fiber type holding a single motor unit.
pub fn single_unit_muscle(fiber: FiberTypeConfig, config: MuscleConfig) -> Result<Muscle> {
    Muscle::new(config.with_fiber_types(vec![fiber.with_fractional_pcsa(1.0).with_motor_units(1)]))
}

/// Hold `input` for `duration` seconds from rest at [`PATH`].
pub fn hold(
    muscle: Muscle,
    input: MuscleInput,
    duration: f64,
) -> Result<(MuscleSimulation, Vec<MuscleOutputs>)> {
    let mut sim = MuscleSimulation::new(muscle, PATH);
    let outputs = sim.run(steps(duration), DT, |_| input)?;
    Ok((sim, outputs))
}

/// Number of [`DT`] steps covering `duration` seconds.
#[must_use]
pub fn steps(duration: f64) -> usize {
    (duration / DT).round() as usize
}
