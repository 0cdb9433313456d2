//! Fixed-step integration of continuous state vectors.
//!
//! The muscle never advances its own state. These integrators stand in for
//! the host's solver: they repeatedly query a [`ContinuousDynamics`] for
//! derivatives at trial states and combine them into a step.
//!
//! # Integration Methods
//!
//! - **Explicit Euler**: one evaluation per step, first order
//! - **RK4**: four evaluations per step, fourth order
//! - **Implicit Euler**: Newton iteration on a finite-difference Jacobian,
//!   first order, unconditionally stable
//!
//! The fascicle dynamics are stiff. The lumped mass is half the muscle mass,
//! while the active force-velocity curve acts as a damper of the order of
//! F0 per L0/s, which puts the fastest eigenvalues near 10⁶ 1/s once the
//! muscle is active. The explicit methods then need steps of about 1 µs;
//! the implicit method is stable at any step and is the default.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};

use crate::error::{MuscleError, Result};

/// A system of first-order ODEs `dx/dt = f(x)`.
///
/// Implementors must be pure: the same state always yields the same
/// derivative.
pub trait ContinuousDynamics {
    /// Length of the state vector.
    fn state_len(&self) -> usize;

    /// Write `dx/dt` at `x` into `dx`.
    fn derivatives(&self, x: &[f64], dx: &mut [f64]) -> Result<()>;
}

/// Trait for fixed-step integration methods.
pub trait Integrator {
    /// Advance `x` in place by `dt` seconds.
    fn integrate<D: ContinuousDynamics + ?Sized>(
        dynamics: &D,
        x: &mut DVector<f64>,
        dt: f64,
    ) -> Result<()>;
}

/// Available integration methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IntegrationMethod {
    /// First-order explicit Euler.
    ExplicitEuler,
    /// Classic fourth-order Runge-Kutta.
    RungeKutta4,
    /// Backward Euler with Newton iteration.
    #[default]
    ImplicitEuler,
}

/// Dispatch to the integrator selected by `method`.
pub fn integrate_with_method<D: ContinuousDynamics + ?Sized>(
    method: IntegrationMethod,
    dynamics: &D,
    x: &mut DVector<f64>,
    dt: f64,
) -> Result<()> {
    match method {
        IntegrationMethod::ExplicitEuler => ExplicitEuler::integrate(dynamics, x, dt),
        IntegrationMethod::RungeKutta4 => RungeKutta4::integrate(dynamics, x, dt),
        IntegrationMethod::ImplicitEuler => ImplicitEuler::integrate(dynamics, x, dt),
    }
}

fn check_len<D: ContinuousDynamics + ?Sized>(dynamics: &D, x: &DVector<f64>) -> Result<()> {
    let expected = dynamics.state_len();
    if x.len() == expected {
        Ok(())
    } else {
        Err(MuscleError::state_length(expected, x.len()))
    }
}

fn evaluate<D: ContinuousDynamics + ?Sized>(
    dynamics: &D,
    x: &DVector<f64>,
) -> Result<DVector<f64>> {
    let mut dx = DVector::zeros(x.len());
    dynamics.derivatives(x.as_slice(), dx.as_mut_slice())?;
    Ok(dx)
}

/// Explicit Euler integration (first-order).
///
/// ```text
/// x(t+dt) = x(t) + f(x(t))·dt
/// ```
pub struct ExplicitEuler;

impl Integrator for ExplicitEuler {
    fn integrate<D: ContinuousDynamics + ?Sized>(
        dynamics: &D,
        x: &mut DVector<f64>,
        dt: f64,
    ) -> Result<()> {
        check_len(dynamics, x)?;
        let k1 = evaluate(dynamics, x)?;
        x.axpy(dt, &k1, 1.0);
        Ok(())
    }
}

/// Fourth-order Runge-Kutta integration.
///
/// ```text
/// k1 = f(x)
/// k2 = f(x + dt/2·k1)
/// k3 = f(x + dt/2·k2)
/// k4 = f(x + dt·k3)
/// x(t+dt) = x(t) + dt/6·(k1 + 2·k2 + 2·k3 + k4)
/// ```
pub struct RungeKutta4;

impl Integrator for RungeKutta4 {
    fn integrate<D: ContinuousDynamics + ?Sized>(
        dynamics: &D,
        x: &mut DVector<f64>,
        dt: f64,
    ) -> Result<()> {
        const RK4_B: [f64; 4] = [1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0];

        check_len(dynamics, x)?;
        let half = 0.5 * dt;

        let k1 = evaluate(dynamics, x)?;
        let k2 = evaluate(dynamics, &(&*x + &k1 * half))?;
        let k3 = evaluate(dynamics, &(&*x + &k2 * half))?;
        let k4 = evaluate(dynamics, &(&*x + &k3 * dt))?;

        for (k, b) in [&k1, &k2, &k3, &k4].into_iter().zip(RK4_B) {
            x.axpy(dt * b, k, 1.0);
        }
        Ok(())
    }
}

/// Backward Euler integration (first-order, implicit).
///
/// Solves
///
/// ```text
/// x(t+dt) = x(t) + f(x(t+dt))·dt
/// ```
///
/// with a simplified Newton iteration: the Jacobian of `f` is estimated by
/// forward differences at the start of the step and reused while each
/// update is at most a quarter of the previous one. A slower iterate gets a
/// fresh Jacobian. A step that has not converged after
/// [`MAX_ITERATIONS`](Self::MAX_ITERATIONS), or whose iteration matrix
/// `I - dt·J` is singular, fails with [`MuscleError::NotConverged`] and
/// leaves `x` at its last iterate.
pub struct ImplicitEuler;

impl ImplicitEuler {
    /// Newton iteration limit per step.
    pub const MAX_ITERATIONS: usize = 20;

    /// Convergence tolerance on the Newton update, relative to the state norm.
    pub const TOLERANCE: f64 = 1e-10;

    /// Relative perturbation of the finite-difference Jacobian.
    const PERTURBATION: f64 = 1e-7;

    /// Smallest absolute perturbation.
    const MIN_PERTURBATION: f64 = 1e-10;

    /// Forward-difference Jacobian of `f` at `x`, where `fx = f(x)`.
    pub fn jacobian<D: ContinuousDynamics + ?Sized>(
        dynamics: &D,
        x: &DVector<f64>,
        fx: &DVector<f64>,
    ) -> Result<DMatrix<f64>> {
        let n = x.len();
        let mut jacobian = DMatrix::zeros(n, n);
        let mut probe = x.clone();

        for j in 0..n {
            let h = (Self::PERTURBATION * x[j].abs()).max(Self::MIN_PERTURBATION);
            probe[j] = x[j] + h;
            let fp = evaluate(dynamics, &probe)?;
            probe[j] = x[j];

            jacobian.set_column(j, &((fp - fx) / h));
        }
        Ok(jacobian)
    }

    /// LU factors of `I - dt·J` at `x`.
    fn iteration_matrix<D: ContinuousDynamics + ?Sized>(
        dynamics: &D,
        x: &DVector<f64>,
        fx: &DVector<f64>,
        dt: f64,
    ) -> Result<LU<f64, Dyn, Dyn>> {
        let n = x.len();
        let jacobian = Self::jacobian(dynamics, x, fx)?;
        Ok((DMatrix::identity(n, n) - jacobian * dt).lu())
    }
}

impl Integrator for ImplicitEuler {
    fn integrate<D: ContinuousDynamics + ?Sized>(
        dynamics: &D,
        x: &mut DVector<f64>,
        dt: f64,
    ) -> Result<()> {
        check_len(dynamics, x)?;

        let start = x.clone();
        let mut f = evaluate(dynamics, &start)?;
        let mut lu = Self::iteration_matrix(dynamics, &start, &f, dt)?;
        let mut previous = f64::INFINITY;

        for iteration in 0..Self::MAX_ITERATIONS {
            let residual = &*x - &start - &f * dt;
            let delta = lu.solve(&residual).ok_or(MuscleError::NotConverged {
                iterations: iteration,
                update: previous,
            })?;
            *x -= &delta;
            f = evaluate(dynamics, x)?;

            let update = delta.norm();
            if update <= Self::TOLERANCE * (1.0 + x.norm()) {
                return Ok(());
            }
            if update > 0.25 * previous {
                lu = Self::iteration_matrix(dynamics, x, &f, dt)?;
            }
            previous = update;
        }

        Err(MuscleError::NotConverged {
            iterations: Self::MAX_ITERATIONS,
            update: previous,
        })
    }
}
