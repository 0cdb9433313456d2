//! Recruitment integration tests.
//!
//! Natural recruitment, discrete and continuous, observed through the
//! host loop.

use approx::assert_relative_eq;
use sim_muscle_tests::{DT, PATH, hold, single_unit_muscle, steady_slow_twitch, steps};
use sim_virtual_muscle::{
    ActivationDynamics, ApportionMethod, Muscle, MuscleConfig, MuscleInput, MuscleSimulation,
    NumericGuard, RecruitmentType,
};

/// Test: Activation below every threshold recruits nothing.
#[test]
fn test_sub_threshold_activation_recruits_nothing() {
    let muscle = Muscle::new(MuscleConfig::default()).unwrap();
    let first_threshold = muscle.recruitment().thresholds()[0];
    let input = MuscleInput::new(0.5 * first_threshold, PATH);

    let resting = hold(muscle.clone(), MuscleInput::new(0.0, PATH), 0.1).unwrap().1;
    let (sim, outputs) = hold(muscle, input, 0.1).unwrap();

    let step = sim.muscle().step_from(&sim.state().unwrap(), &input).unwrap();
    assert!(step.diagnostics.excitations.iter().all(|e| *e == 0.0));
    assert!(sim.state().unwrap().units.iter().all(|u| u.fint == 0.0 && u.feff == 0.0));

    // Same passive force as a muscle that was never activated
    let last = outputs[outputs.len() - 1].tendon_force;
    assert_relative_eq!(last, resting[resting.len() - 1].tendon_force, epsilon = 1e-9);
}

/// Test: A single unit recruited almost immediately follows a slow ramp
/// monotonically and settles at the force its maximal firing rate predicts.
#[test]
fn test_single_unit_ramp_is_monotonic() {
    let fiber = steady_slow_twitch();
    let config = MuscleConfig::default()
        .with_apportionment(ApportionMethod::Equal)
        .with_full_recruitment_at(0.001);
    let muscle = single_unit_muscle(fiber.clone(), config).unwrap();
    let f0 = muscle.max_isometric_force();
    assert_relative_eq!(muscle.recruitment().thresholds()[0], 0.001);

    let ramp = 0.5;
    let mut sim = MuscleSimulation::new(muscle, PATH);
    let outputs = sim
        .run(steps(ramp + 1.0), DT, |t| {
            MuscleInput::new((t / ramp).min(1.0), PATH)
        })
        .unwrap();

    // Sample every 25 ms once the passive settling is over
    let samples: Vec<f64> = outputs
        .iter()
        .skip(10)
        .step_by(25)
        .map(|o| o.tendon_force)
        .collect();
    for pair in samples.windows(2) {
        assert!(
            pair[1] >= pair[0] - 1e-3 * f0,
            "force dropped from {} to {}",
            pair[0],
            pair[1]
        );
    }

    // Full activation drives the unit at f_max
    let input = MuscleInput::new(1.0, PATH);
    let step = sim.muscle().step_from(&sim.state().unwrap(), &input).unwrap();
    let d = &step.diagnostics;
    assert_relative_eq!(d.excitations[0], fiber.f_max, max_relative = 1e-12);

    // The filters have caught up, so Af is the steady-state value at f_max
    let lce = step.outputs.fascicle_length;
    let dynamics = ActivationDynamics::from_fiber(&fiber, NumericGuard::Clamp);
    let af = dynamics.activation(lce, 1.0, 1.0, fiber.f_max);
    assert_relative_eq!(d.unit_activations[0], af, max_relative = 1e-3);

    // Isometric, so FV is 1 and the tendon carries F0·(FPE1 + Af·(FL + FPE2))
    let fl = d.fiber_types[0].force_length;
    let predicted = f0 * (d.parallel_elastic + af * (fl + d.compression_elastic));
    assert_relative_eq!(d.tendon_force, predicted, max_relative = 0.01);
    assert!(d.tendon_force > 0.3 * f0);
}

/// Test: Under discrete recruitment, larger activations recruit more units.
#[test]
fn test_discrete_recruitment_order() {
    let muscle = Muscle::new(MuscleConfig::default()).unwrap();
    let state = muscle.initial_state(PATH);

    let recruited = |activation: f64| {
        let step = muscle.step_from(&state, &MuscleInput::new(activation, PATH)).unwrap();
        step.diagnostics.excitations.iter().filter(|e| **e > 0.0).count()
    };

    let counts: Vec<usize> = [0.05, 0.2, 0.4, 0.6, 0.85].into_iter().map(recruited).collect();
    assert!(counts.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(counts[counts.len() - 1], muscle.motor_unit_count());
}

/// Test: The activation level rises quickly and falls slowly.
#[test]
fn test_continuous_level_smoothing() {
    let config = MuscleConfig::default().with_recruitment(RecruitmentType::ContinuousNatural);
    let muscle = Muscle::new(config).unwrap();
    let mut sim = MuscleSimulation::new(muscle, PATH);

    // One rise time constant
    sim.run(steps(0.03), DT, |_| MuscleInput::new(1.0, PATH)).unwrap();
    let peak = sim.state().unwrap().activation_level;
    assert!(peak > 0.55 && peak < 0.7, "level after 30 ms: {peak}");

    // The same duration of release loses much less
    sim.run(steps(0.03), DT, |_| MuscleInput::new(0.0, PATH)).unwrap();
    let released = sim.state().unwrap().activation_level;
    assert!(released < peak);
    assert!(released > 0.75 * peak, "level after release: {released}");
}

/// Test: Continuous recruitment develops force once the level passes the
/// first threshold.
#[test]
fn test_continuous_recruitment_develops_force() {
    let config = MuscleConfig::default().with_recruitment(RecruitmentType::ContinuousNatural);
    let muscle = Muscle::new(config).unwrap();
    let f0 = muscle.max_isometric_force();

    let (_, idle) = hold(muscle.clone(), MuscleInput::new(0.0, PATH), 0.3).unwrap();
    let (sim, active) = hold(muscle, MuscleInput::new(1.0, PATH), 0.3).unwrap();

    let idle_force = idle[idle.len() - 1].tendon_force;
    let active_force = active[active.len() - 1].tendon_force;
    assert!(active_force > idle_force + 0.1 * f0);
    assert!(sim.state().unwrap().activation_level > 0.99);
}
