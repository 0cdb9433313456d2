//! Virtual Muscle actuator for musculoskeletal simulation.
//!
//! This crate implements the Virtual Muscle model of a skeletal
//! muscle-tendon actuator. Unlike a lumped Hill-type model, the muscle is
//! built from individual motor units grouped into fiber types, so that
//! recruitment order, firing-rate dependent activation, yield and sag all
//! shape the force it produces.
//!
//! # Model
//!
//! ```text
//!                    ┌───────────────────────────────────────────┐
//!    Activation ────►│  Recruitment ──► Activation ──► Fascicle  │
//!        a           │  (fenv/unit)     dynamics      mechanics  │
//!                    │                  (Af/unit)     FL·FV·FPE  │
//!    Frequency ─────►│                                   │ Fce   │
//!   (FES only)       │                                   ▼       │
//!                    │                    Fse ◄── mass ◄── tendon├───► Force
//!    Path length ───►│                                           │
//!                    └───────────────────────────────────────────┘
//! ```
//!
//! 1. **Apportionment** splits each fiber type's fractional PCSA over its
//!    motor units, once, when the muscle is built.
//! 2. **Recruitment** maps the drive (activation, smoothed activation level
//!    or stimulation frequency) to a firing rate per unit.
//! 3. **Activation dynamics** filter the firing rate and turn it into an
//!    activation through the activation-frequency relationship, modulated by
//!    yield and sag.
//! 4. **Contraction mechanics** evaluate force-length, force-velocity and
//!    passive elastic curves per fiber type.
//! 5. **Musculotendon coupling** connects the fascicle to a nonlinear tendon
//!    through a lumped mass.
//!
//! # Quick Start
//!
//! ```
//! use sim_virtual_muscle::{Muscle, MuscleConfig, MuscleInput, MuscleSimulation};
//!
//! // Two fiber types (slow and fast), five motor units each
//! let muscle = Muscle::new(MuscleConfig::default())?;
//! let mut sim = MuscleSimulation::new(muscle, 0.09);
//!
//! // Full activation at a fixed 9 cm path
//! let input = MuscleInput::new(1.0, 0.09);
//! let outputs = sim.run(400, 5e-4, |_| input)?;
//!
//! let last = outputs[outputs.len() - 1];
//! println!("Tendon force after 0.2 s: {:.2} N", last.tendon_force);
//! # Ok::<(), sim_virtual_muscle::MuscleError>(())
//! ```
//!
//! # Host Integration
//!
//! The muscle does not own its state. A host stores the flat state vector
//! (five entries per motor unit followed by fascicle velocity, fascicle
//! length and activation level), calls [`Muscle::evaluate`] once per major
//! step and [`Muscle::derivatives`] from its solver. [`MuscleSimulation`]
//! is a small such host built on the integrators in [`integrate`].
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//!
//! - Block-diagram and co-simulation hosts
//! - Headless parameter studies
//! - Neuroprosthesis and FES controller design
//!
//! # References
//!
//! - Cheng, E.J., Brown, I.E., Loeb, G.E. (2000). Virtual Muscle: a
//!   computational approach to understanding the effects of muscle
//!   properties on motor control.
//! - Song, D., Raphael, G., Lan, N., Loeb, G.E. (2008). Computationally
//!   efficient models of neuromuscular recruitment and mechanics.
//! - Tsianos, G.A., Loeb, G.E. (2013). Muscle physiology and modeling.

#![doc(html_root_url = "https://docs.rs/sim-virtual-muscle/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::doc_markdown,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::too_many_arguments,
    clippy::suboptimal_flops,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::let_and_return,
    clippy::derivable_impls,
    clippy::imprecise_flops,
    clippy::many_single_char_names
)]
#![cfg_attr(test, allow(clippy::float_cmp, clippy::let_underscore_must_use))]

pub mod activation;
pub mod apportion;
pub mod config;
pub mod curves;
pub mod error;
pub mod integrate;
pub mod muscle;
pub mod musculotendon;
pub mod params;
pub mod recruitment;
pub mod simulation;
pub mod state;

// Re-export main types at crate root
pub use activation::{ActivationDynamics, FilterPhase};
pub use apportion::apportion;
pub use config::{
    ApportionMethod, FiberTypeConfig, MuscleConfig, NumericGuard, OutputSelection,
    RecruitmentType,
};
pub use curves::{
    CompressionElasticCurve, FiberCurves, ForceLengthCurve, ForceVelocityCurve,
    ParallelElasticCurve, SeriesElasticCurve, VelocityBranch,
};
pub use error::{MuscleError, Result};
pub use integrate::{
    ContinuousDynamics, ExplicitEuler, ImplicitEuler, IntegrationMethod, Integrator,
    RungeKutta4, integrate_with_method,
};
pub use muscle::{
    FiberDiagnostics, Muscle, MuscleDiagnostics, MuscleInput, MuscleOutputs, MuscleStep,
};
pub use musculotendon::Musculotendon;
pub use params::ParameterSet;
pub use recruitment::RecruitmentModel;
pub use simulation::{DrivenMuscle, MuscleSimulation};
pub use state::{MotorUnitState, MuscleState};
