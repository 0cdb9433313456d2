//! Host contract integration tests.
//!
//! Reinitialization, output ports and the flat parameter table.

use approx::assert_relative_eq;
use sim_muscle_tests::{DT, PATH, hold, steps};
use sim_virtual_muscle::{
    IntegrationMethod, Muscle, MuscleConfig, MuscleError, MuscleInput, MuscleSimulation,
    OutputSelection, ParameterSet, RecruitmentType,
};

/// Test: A degenerate fascicle length is repaired once and only once.
#[test]
fn test_reinitialization_is_idempotent() {
    let muscle = Muscle::new(MuscleConfig::default()).unwrap();

    let mut once = muscle.initial_state(PATH);
    once.fascicle_length = -0.01;
    muscle.reinitialize(&mut once, PATH);
    let mut twice = once.clone();
    muscle.reinitialize(&mut twice, PATH);
    assert_eq!(once, twice);

    let mut sim = MuscleSimulation::new(muscle, PATH);
    let mut state = sim.state().unwrap();
    state.fascicle_length = -0.01;
    sim.set_state(&state).unwrap();

    let input = MuscleInput::new(0.2, PATH);
    assert!(sim.step(&input, 1e-3).unwrap().reinitialized);
    assert!(sim.state().unwrap().fascicle_length > 0.0);
    assert!(!sim.step(&input, 1e-3).unwrap().reinitialized);
}

/// Test: The activation filters fill from rest on the first step and never
/// go negative through a contraction and the relaxation after it.
#[test]
fn test_filters_stay_non_negative() {
    let muscle = Muscle::new(MuscleConfig::default()).unwrap();
    let input = MuscleInput::new(1.0, PATH);

    let mut implicit = MuscleSimulation::new(muscle.clone(), PATH);
    let mut explicit =
        MuscleSimulation::new(muscle.clone(), PATH).with_method(IntegrationMethod::ExplicitEuler);
    implicit.step(&input, 1e-4).unwrap();
    explicit.step(&input, 1e-4).unwrap();

    let implicit = implicit.state().unwrap();
    let explicit = explicit.state().unwrap();
    for (i, e) in implicit.units.iter().zip(&explicit.units) {
        assert!(i.fint > 0.0, "fint {} after one step", i.fint);
        assert!(i.fint <= e.fint + 1e-12);
        assert!(i.feff >= 0.0);
    }

    let mut sim = MuscleSimulation::new(muscle, PATH);
    let contraction = steps(0.3);
    let mut peak = 0.0_f64;
    for k in 0..contraction + steps(0.4) {
        let activation = if k < contraction { 1.0 } else { 0.0 };
        sim.step(&MuscleInput::new(activation, PATH), DT).unwrap();

        let state = sim.state().unwrap();
        for unit in &state.units {
            assert!(unit.fint >= 0.0 && unit.feff >= 0.0, "negative filter at step {k}");
            peak = peak.max(unit.feff);
        }
    }

    assert!(peak > 0.5);
    let state = sim.state().unwrap();
    assert!(state.units.iter().all(|u| u.feff < 0.2 * peak));
}

/// Test: Ports follow the fixed order, tendon force first.
#[test]
fn test_output_port_ordering() {
    let config = MuscleConfig::default().with_outputs(OutputSelection::all());
    let muscle = Muscle::new(config).unwrap();
    assert_eq!(muscle.output_count(), 5);

    let input = MuscleInput::new(0.4, PATH);
    let (sim, _) = hold(muscle, input, 0.05).unwrap();
    let outputs = sim.muscle().outputs(&sim.state().unwrap(), &input).unwrap();
    let ports = outputs.ports(&sim.muscle().config().outputs);

    assert_eq!(
        ports,
        vec![
            outputs.tendon_force,
            0.4,
            outputs.tendon_force / sim.muscle().max_isometric_force(),
            outputs.fascicle_length,
            outputs.fascicle_velocity,
        ]
    );

    let length_only = OutputSelection {
        fascicle_length: true,
        ..OutputSelection::default()
    };
    assert_eq!(
        outputs.ports(&length_only),
        vec![outputs.tendon_force, outputs.fascicle_length]
    );
}

/// Test: Under a sustained isometric contraction the tendon and fascicle
/// forces balance.
#[test]
fn test_isometric_force_balance() {
    let muscle = Muscle::new(MuscleConfig::default()).unwrap();
    let input = MuscleInput::new(1.0, PATH);

    let (sim, _) = hold(muscle, input, 0.5).unwrap();
    let step = sim.muscle().step_from(&sim.state().unwrap(), &input).unwrap();

    let tendon = step.diagnostics.tendon_force;
    assert!(tendon > 0.2 * sim.muscle().max_isometric_force());
    assert_relative_eq!(step.diagnostics.fascicle_force, tendon, max_relative = 0.01);
    assert!(step.outputs.fascicle_velocity.abs() < 0.05);
}

/// Test: A flat parameter table configures a stimulated muscle.
#[test]
fn test_parameter_table_pipeline() {
    let mut table = ParameterSet::default();
    table.recruitment_type = 4.0;
    table.output_ports = vec![1.0, 1.0, 1.0, 0.0, 0.0];

    let config = MuscleConfig::try_from(table).unwrap();
    assert_eq!(config.recruitment, RecruitmentType::IntramuscularFes);

    let muscle = Muscle::new(config).unwrap();
    assert_eq!(muscle.output_count(), 3);

    let input = MuscleInput::new(1.0, PATH).with_frequency(30.0);
    let (_, outputs) = hold(muscle, input, 0.2).unwrap();
    assert!(outputs[outputs.len() - 1].tendon_force > outputs[0].tendon_force);
}

/// Test: Malformed tables are rejected before any muscle is built.
#[test]
fn test_parameter_table_rejected() {
    let mut table = ParameterSet::default();
    table.recruitment_type = 7.0;
    assert!(matches!(
        MuscleConfig::try_from(table),
        Err(MuscleError::InvalidSelector { parameter: "RTYPE", .. })
    ));

    let mut table = ParameterSet::default();
    table.fiber_types = 3;
    let err = MuscleConfig::try_from(table).unwrap_err();
    assert!(err.is_configuration_error());
}
