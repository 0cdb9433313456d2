//! Yield and sag integration tests.
//!
//! Both processes are first-order lags towards a target set by the
//! fascicle velocity (yield) or the effective firing rate (sag).

use approx::assert_relative_eq;
use nalgebra::DVector;
use sim_muscle_tests::{DT, PATH, single_unit_muscle, steps};
use sim_virtual_muscle::activation::YIELD_RATE;
use sim_virtual_muscle::{
    ActivationDynamics, ContinuousDynamics, FiberTypeConfig, Integrator, MuscleConfig,
    MuscleInput, MuscleSimulation, NumericGuard, Result, RungeKutta4,
};

/// Yield of one unit at a fixed fascicle velocity.
struct YieldAtVelocity {
    dynamics: ActivationDynamics,
    vce: f64,
}

impl ContinuousDynamics for YieldAtVelocity {
    fn state_len(&self) -> usize {
        1
    }

    fn derivatives(&self, x: &[f64], dx: &mut [f64]) -> Result<()> {
        dx[0] = self.dynamics.yield_derivative(x[0], self.vce);
        Ok(())
    }
}

/// Test: Yield settles within 1% of its target after five time constants.
#[test]
fn test_yield_converges() {
    let fiber = FiberTypeConfig::slow_twitch();
    let system = YieldAtVelocity {
        dynamics: ActivationDynamics::from_fiber(&fiber, NumericGuard::Clamp),
        vce: 0.2,
    };
    let target = 1.0 - fiber.c_y * (1.0 - (-0.2 / fiber.v_y).exp());

    let tau = 1.0 / YIELD_RATE;
    let dt = 1e-3;
    let mut y = DVector::from_element(1, 1.0);
    for _ in 0..(5.0 * tau / dt).round() as usize {
        RungeKutta4::integrate(&system, &mut y, dt).unwrap();
    }

    let gap = (1.0 - target).abs();
    assert!((y[0] - target).abs() < 0.01 * gap);
    assert!(y[0] > target);

    // At rest yield recovers to 1
    let resting = YieldAtVelocity { vce: 0.0, ..system };
    let start = y[0];
    for _ in 0..(5.0 * tau / dt).round() as usize {
        RungeKutta4::integrate(&resting, &mut y, dt).unwrap();
    }
    assert!((1.0 - y[0]).abs() < 0.01 * (1.0 - start));
}

/// Test: Sag settles within 1% of its high-rate level after five time
/// constants of sustained firing.
#[test]
fn test_sag_converges() {
    let fiber = FiberTypeConfig::fast_twitch();
    let (a_s1, a_s2, t_s) = (fiber.a_s1, fiber.a_s2, fiber.t_s * 1e-3);
    let muscle = single_unit_muscle(fiber, MuscleConfig::default()).unwrap();

    let mut sim = MuscleSimulation::new(muscle, PATH);
    let mut state = sim.state().unwrap();
    assert_relative_eq!(state.units[0].sag, a_s1);

    // Start already firing so the sag drive is above threshold throughout
    state.units[0].fint = 1.0;
    state.units[0].feff = 1.0;
    sim.set_state(&state).unwrap();

    sim.run(steps(5.0 * t_s) + 5, DT, |_| MuscleInput::new(1.0, PATH))
        .unwrap();

    let sag = sim.state().unwrap().units[0].sag;
    assert!((sag - a_s2).abs() < 0.01 * (a_s1 - a_s2).abs(), "sag {sag}");
}

/// Test: Moving the path lowers yield compared with an isometric hold.
#[test]
fn test_movement_induces_yield() {
    let fiber = FiberTypeConfig::slow_twitch();
    let config = MuscleConfig::default();

    let run = |amplitude: f64| {
        let muscle = single_unit_muscle(fiber.clone(), config.clone()).unwrap();
        let mut sim = MuscleSimulation::new(muscle, PATH);
        sim.run(steps(1.0), DT, |t| {
            let path = PATH + amplitude * (2.0 * std::f64::consts::PI * 2.0 * t).sin();
            MuscleInput::new(0.5, path)
        })
        .unwrap();
        sim.state().unwrap().units[0].yield_factor
    };

    let isometric = run(0.0);
    let moving = run(0.005);
    assert!(moving < isometric - 0.05, "moving {moving}, isometric {isometric}");
    assert!(moving > 1.0 - fiber.c_y - 1e-9);
}
