//! Intramuscular stimulation integration tests.

use sim_muscle_tests::{PATH, hold, single_unit_muscle, steady_slow_twitch};
use sim_virtual_muscle::{Muscle, MuscleConfig, MuscleInput, RecruitmentType};

fn stimulated_muscle() -> Muscle {
    let config = MuscleConfig::default().with_recruitment(RecruitmentType::IntramuscularFes);
    single_unit_muscle(steady_slow_twitch(), config).unwrap()
}

/// Test: Activation rises with stimulation frequency towards 1 without
/// reaching it.
#[test]
fn test_frequency_sweep_saturates() {
    let muscle = stimulated_muscle();
    let state = muscle.initial_state(PATH);

    let activations: Vec<f64> = [2.0, 4.0, 8.0, 16.0, 32.0, 64.0]
        .into_iter()
        .map(|f| {
            let input = MuscleInput::new(1.0, PATH).with_frequency(f);
            muscle.step_from(&state, &input).unwrap().diagnostics.unit_activations[0]
        })
        .collect();

    assert!(activations[0] > 0.0);
    assert!(activations.windows(2).all(|w| w[1] > w[0]));
    assert!(activations.iter().all(|a| *a < 1.0));
    assert!(activations[activations.len() - 1] > 0.99);

    // Diminishing returns near saturation
    let gains: Vec<f64> = activations.windows(2).map(|w| w[1] - w[0]).collect();
    let n = gains.len();
    assert!(gains[n - 1] < gains[n - 2]);
    assert!(gains[n - 2] < gains[n - 3]);
}

/// Test: Without pulses the stimulated muscle stays passive.
#[test]
fn test_zero_frequency_is_passive() {
    let muscle = stimulated_muscle();
    let state = muscle.initial_state(PATH);
    let step = muscle
        .step_from(&state, &MuscleInput::new(1.0, PATH).with_frequency(0.0))
        .unwrap();

    assert_eq!(step.diagnostics.excitations, vec![0.0]);
    assert_eq!(step.diagnostics.unit_activations, vec![0.0]);
}

/// Test: Sustained stimulation builds force as the effective activation
/// follows the amplitude input.
#[test]
fn test_sustained_stimulation_builds_force() {
    let muscle = stimulated_muscle();
    let f0 = muscle.max_isometric_force();
    let input = MuscleInput::new(1.0, PATH).with_frequency(20.0);

    let (sim, outputs) = hold(muscle, input, 0.5).unwrap();

    let samples: Vec<f64> = outputs.iter().skip(10).step_by(50).map(|o| o.tendon_force).collect();
    assert!(samples.windows(2).all(|w| w[1] >= w[0] - 1e-3 * f0));
    assert!(samples[samples.len() - 1] > 0.3 * f0);

    let unit = sim.state().unwrap().units[0];
    assert!(unit.feff > 0.9 && unit.feff <= 1.0 + 1e-9);
}

/// Test: The activation input scales stimulated force.
#[test]
fn test_amplitude_scales_force() {
    let f = |amplitude: f64| {
        let input = MuscleInput::new(amplitude, PATH).with_frequency(20.0);
        let (_, outputs) = hold(stimulated_muscle(), input, 0.4).unwrap();
        outputs[outputs.len() - 1].tendon_force
    };

    let weak = f(0.3);
    let strong = f(0.9);
    assert!(strong > weak);
}
