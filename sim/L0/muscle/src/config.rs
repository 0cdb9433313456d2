//! Muscle and fiber-type configuration.
//!
//! A [`MuscleConfig`] holds every parameter of one Virtual Muscle actuator.
//! It is read once when a [`Muscle`](crate::Muscle) is built and is immutable
//! for the duration of a simulation run.
//!
//! # Units
//!
//! The configuration follows the units of the Virtual Muscle parameter
//! tables:
//!
//! | Quantity                        | Unit      |
//! |---------------------------------|-----------|
//! | Muscle mass                     | g         |
//! | Optimal fascicle length (L0)    | cm        |
//! | Tendon slack length (L0T)       | cm        |
//! | Maximum path length             | cm        |
//! | Specific tension                | N/cm²     |
//! | Rise/fall and sag time constants| ms        |
//! | Half-maximal frequency (f0.5)   | pulses/s  |
//! | Fmin, Fmax                      | f0.5      |
//! | Velocities                      | L0/s      |
//!
//! Path length supplied at run time is in metres.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{MuscleError, Result};

/// Tolerance used when checking that fractional PCSA does not exceed 1.
pub const PCSA_SUM_TOLERANCE: f64 = 1e-9;

/// How motor units are recruited. Fixed for a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RecruitmentType {
    /// Units are recruited one by one in size order as activation rises.
    #[default]
    DiscreteNatural,
    /// Fiber types are recruited as blocks, driven by a smoothed activation
    /// level that is integrated as an extra state.
    ContinuousNatural,
    /// Intramuscular electrical stimulation: every unit fires at the
    /// stimulation frequency, no recruitment thresholds.
    IntramuscularFes,
}

impl RecruitmentType {
    /// Decodes the numeric selector of the host parameter table
    /// (2 = natural, 3 = natural continuous, 4 = intramuscular FES).
    pub fn from_selector(value: f64) -> Result<Self> {
        match value {
            v if v == 2.0 => Ok(Self::DiscreteNatural),
            v if v == 3.0 => Ok(Self::ContinuousNatural),
            v if v == 4.0 => Ok(Self::IntramuscularFes),
            value => Err(MuscleError::InvalidSelector {
                parameter: "RTYPE",
                value,
            }),
        }
    }

    /// Whether the stimulation frequency input is read.
    #[must_use]
    pub const fn uses_frequency(self) -> bool {
        matches!(self, Self::IntramuscularFes)
    }

    /// Whether the activation-level state is integrated.
    #[must_use]
    pub const fn integrates_activation_level(self) -> bool {
        matches!(self, Self::ContinuousNatural)
    }
}

/// Policy used to split each fiber type's fractional PCSA over its units.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ApportionMethod {
    /// Weights supplied directly, one per motor unit in fiber-type-major
    /// order. Used as given.
    Manual {
        /// Unit PCSA weights.
        weights: Vec<f64>,
    },
    /// Weight of unit `j` of fiber type `i` proportional to
    /// `recruitment_rank[i] + j + 1`.
    #[default]
    RankWeighted,
    /// Every unit of a fiber type gets the same share.
    Equal,
    /// Weight of unit `j` proportional to `(1 + growth)^j`.
    Geometric {
        /// Fractional increase from one unit to the next.
        growth: f64,
    },
}

impl ApportionMethod {
    /// Decodes the numeric selector of the host parameter table
    /// (1 = manual, 2 = default, 3 = equal, 4 = geometric).
    pub fn from_selector(value: f64, manual: Vec<f64>, growth: f64) -> Result<Self> {
        match value {
            v if v == 1.0 => Ok(Self::Manual { weights: manual }),
            v if v == 2.0 => Ok(Self::RankWeighted),
            v if v == 3.0 => Ok(Self::Equal),
            v if v == 4.0 => Ok(Self::Geometric { growth }),
            value => Err(MuscleError::InvalidSelector {
                parameter: "APPORTMTD",
                value,
            }),
        }
    }
}

/// Optional outputs reported after tendon force.
///
/// Tendon force is always the first output; the selected extras follow in
/// the order of the fields below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutputSelection {
    /// Echo the activation input.
    pub activation: bool,
    /// Tendon force divided by maximal isometric force.
    pub normalized_force: bool,
    /// Normalized fascicle length (L0).
    pub fascicle_length: bool,
    /// Normalized fascicle velocity (L0/s).
    pub fascicle_velocity: bool,
}

impl OutputSelection {
    /// Select every optional output.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            activation: true,
            normalized_force: true,
            fascicle_length: true,
            fascicle_velocity: true,
        }
    }

    /// Total number of outputs, tendon force included.
    #[must_use]
    pub fn port_count(&self) -> usize {
        1 + [
            self.activation,
            self.normalized_force,
            self.fascicle_length,
            self.fascicle_velocity,
        ]
        .iter()
        .filter(|&&on| on)
        .count()
    }
}

/// What to do with values that leave the model's valid domain.
///
/// Extreme parameter combinations can push the activation filter states
/// negative or drive the fascicle length towards zero, which makes the
/// activation-frequency law evaluate a fractional power of a negative base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NumericGuard {
    /// Floor filter states and excitation at zero, keep the frequency
    /// exponent and `1/Lce` bounded, and map non-finite activation to zero.
    #[default]
    Clamp,
    /// Evaluate the raw expressions and let NaN propagate to the host.
    Propagate,
}

/// Parameters shared by the motor units of one fiber type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FiberTypeConfig {
    /// Human-readable name ("slow", "fast", ...).
    pub name: String,

    /// Recruitment rank, an offset used by the rank-weighted apportionment.
    pub recruitment_rank: f64,

    /// Fraction of the muscle PCSA made of this fiber type.
    pub fractional_pcsa: f64,

    /// Number of motor units of this type.
    pub motor_units: usize,

    /// Firing frequency producing half-maximal activation (pulses/s).
    pub f_half: f64,

    /// Firing rate at recruitment (f0.5 units).
    pub f_min: f64,

    /// Firing rate at full activation (f0.5 units).
    pub f_max: f64,

    /// Force-length width parameter.
    pub fl_omega: f64,

    /// Force-length skew parameter.
    pub fl_beta: f64,

    /// Force-length roundness parameter.
    pub fl_rho: f64,

    /// Maximum shortening velocity (L0/s, negative).
    pub v_max: f64,

    /// Shortening force-velocity coefficient.
    pub cv0: f64,

    /// Length dependence of the shortening coefficient.
    pub cv1: f64,

    /// Lengthening force-velocity coefficient.
    pub av0: f64,

    /// Linear length dependence of the lengthening coefficient.
    pub av1: f64,

    /// Quadratic length dependence of the lengthening coefficient.
    pub av2: f64,

    /// Lengthening curvature.
    pub bv: f64,

    /// Activation-frequency scale.
    pub af: f64,

    /// Activation-frequency exponent at optimal length.
    pub nf0: f64,

    /// Length dependence of the activation-frequency exponent.
    pub nf1: f64,

    /// Rise time constant, length term (ms).
    pub tf1: f64,

    /// Rise time constant, excitation term (ms).
    pub tf2: f64,

    /// Fall time constant, constant term (ms).
    pub tf3: f64,

    /// Fall time constant, activation term (ms).
    pub tf4: f64,

    /// Yield magnitude. Values at or below [`YIELD_THRESHOLD`] disable yield.
    ///
    /// [`YIELD_THRESHOLD`]: crate::activation::YIELD_THRESHOLD
    pub c_y: f64,

    /// Yield velocity scale (L0/s).
    pub v_y: f64,

    /// Sag level at low firing rates.
    pub a_s1: f64,

    /// Sag level at high firing rates. Equal to `a_s1` disables sag.
    pub a_s2: f64,

    /// Sag time constant (ms).
    pub t_s: f64,
}

impl Default for FiberTypeConfig {
    fn default() -> Self {
        Self::slow_twitch()
    }
}

impl FiberTypeConfig {
    /// Mammalian slow-twitch fibers (Virtual Muscle 4.0 defaults).
    ///
    /// Slow fibers show yield but no sag.
    #[must_use]
    pub fn slow_twitch() -> Self {
        Self {
            name: "slow".to_owned(),
            recruitment_rank: 1.0,
            fractional_pcsa: 1.0,
            motor_units: 1,
            f_half: 8.5,
            f_min: 0.5,
            f_max: 2.0,
            fl_omega: 1.26,
            fl_beta: 2.30,
            fl_rho: 1.62,
            v_max: -7.88,
            cv0: 5.88,
            cv1: 0.0,
            av0: -4.70,
            av1: 8.41,
            av2: -5.34,
            bv: 0.35,
            af: 0.56,
            nf0: 2.1,
            nf1: 5.0,
            tf1: 34.3,
            tf2: 22.7,
            tf3: 47.0,
            tf4: 25.2,
            c_y: 0.35,
            v_y: 0.1,
            a_s1: 1.0,
            a_s2: 1.0,
            t_s: 43.0,
        }
    }

    /// Mammalian fast-twitch fibers (Virtual Muscle 4.0 defaults).
    ///
    /// Fast fibers show sag but no yield.
    #[must_use]
    pub fn fast_twitch() -> Self {
        Self {
            name: "fast".to_owned(),
            recruitment_rank: 2.0,
            fractional_pcsa: 1.0,
            motor_units: 1,
            f_half: 34.3,
            f_min: 0.5,
            f_max: 2.0,
            fl_omega: 0.75,
            fl_beta: 1.55,
            fl_rho: 2.12,
            v_max: -9.15,
            cv0: -5.70,
            cv1: 9.18,
            av0: -1.53,
            av1: 0.0,
            av2: 0.0,
            bv: 0.69,
            af: 0.56,
            nf0: 2.1,
            nf1: 3.3,
            tf1: 20.6,
            tf2: 13.6,
            tf3: 28.2,
            tf4: 15.1,
            c_y: 0.0,
            v_y: 0.1,
            a_s1: 1.76,
            a_s2: 0.96,
            t_s: 43.0,
        }
    }

    /// Set the fiber type name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the fractional PCSA.
    #[must_use]
    pub fn with_fractional_pcsa(mut self, fractional_pcsa: f64) -> Self {
        self.fractional_pcsa = fractional_pcsa;
        self
    }

    /// Set the number of motor units.
    #[must_use]
    pub fn with_motor_units(mut self, motor_units: usize) -> Self {
        self.motor_units = motor_units;
        self
    }

    /// Set the recruitment rank.
    #[must_use]
    pub fn with_recruitment_rank(mut self, rank: f64) -> Self {
        self.recruitment_rank = rank;
        self
    }

    /// Set the firing-rate range (f0.5 units).
    #[must_use]
    pub fn with_firing_range(mut self, f_min: f64, f_max: f64) -> Self {
        self.f_min = f_min;
        self.f_max = f_max;
        self
    }

    /// Whether this fiber type has yield behavior.
    #[must_use]
    pub fn has_yield(&self) -> bool {
        self.c_y > crate::activation::YIELD_THRESHOLD
    }

    /// Whether this fiber type has sag behavior.
    #[must_use]
    pub fn has_sag(&self) -> bool {
        self.a_s1 != self.a_s2
    }

    fn validate(&self) -> Result<()> {
        if self.motor_units == 0 {
            return Err(MuscleError::invalid(
                "NUMOFUNITS",
                format!("fiber type `{}` has no motor units", self.name),
            ));
        }
        if !self.fractional_pcsa.is_finite() || self.fractional_pcsa < 0.0 {
            return Err(MuscleError::invalid(
                "FPCSA",
                format!(
                    "fiber type `{}` has fractional PCSA {}",
                    self.name, self.fractional_pcsa
                ),
            ));
        }
        positive("F05", self.f_half)?;
        positive("AF", self.af)?;
        positive("TF1", self.tf1)?;
        positive("TF3", self.tf3)?;
        if self.fl_omega == 0.0 {
            return Err(MuscleError::invalid("FLOMEGA", "must be non-zero"));
        }
        if self.tf2 < 0.0 || self.tf4 < 0.0 {
            return Err(MuscleError::invalid(
                "TF",
                format!("fiber type `{}` has a negative time constant", self.name),
            ));
        }
        if self.has_yield() {
            positive("VY", self.v_y)?;
        }
        if self.has_sag() {
            positive("TS", self.t_s)?;
        }
        Ok(())
    }
}

/// Complete parameter set of one Virtual Muscle actuator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MuscleConfig {
    /// Muscle mass (g).
    pub mass: f64,

    /// Optimal fascicle length L0 (cm).
    pub optimal_fascicle_length: f64,

    /// Tendon slack length L0T (cm).
    pub tendon_slack_length: f64,

    /// Maximum musculotendon path length (cm).
    pub max_path_length: f64,

    /// Specific tension (N/cm²).
    pub specific_tension: f64,

    /// Viscosity of the parallel passive element.
    pub viscosity: f64,

    /// FPE1 scale.
    pub c1: f64,

    /// FPE1 curvature.
    pub k1: f64,

    /// FPE1 rest length (relative to the maximum fascicle length).
    pub lr1: f64,

    /// FPE2 scale.
    pub c2: f64,

    /// FPE2 curvature.
    pub k2: f64,

    /// FPE2 rest length (L0).
    pub lr2: f64,

    /// Tendon (FSE) scale.
    pub c_t: f64,

    /// Tendon curvature.
    pub k_t: f64,

    /// Tendon rest length (L0T).
    pub lr_t: f64,

    /// Activation at which the last motor unit is recruited.
    pub ur: f64,

    /// Recruitment scheme.
    pub recruitment: RecruitmentType,

    /// Unit PCSA apportionment policy.
    pub apportionment: ApportionMethod,

    /// Optional outputs.
    pub outputs: OutputSelection,

    /// Clamping policy for out-of-domain values.
    pub numeric_guard: NumericGuard,

    /// Fiber types, in recruitment order.
    pub fiber_types: Vec<FiberTypeConfig>,
}

impl Default for MuscleConfig {
    fn default() -> Self {
        Self {
            mass: 5.0,
            optimal_fascicle_length: 3.0,
            tendon_slack_length: 6.0,
            max_path_length: 10.0,
            specific_tension: 31.8,
            viscosity: 0.01,
            c1: 23.0,
            k1: 0.046,
            lr1: 1.17,
            c2: -0.02,
            k2: -21.0,
            lr2: 0.70,
            c_t: 27.8,
            k_t: 0.0047,
            lr_t: 0.964,
            ur: 0.8,
            recruitment: RecruitmentType::DiscreteNatural,
            apportionment: ApportionMethod::RankWeighted,
            outputs: OutputSelection::default(),
            numeric_guard: NumericGuard::Clamp,
            fiber_types: vec![
                FiberTypeConfig::slow_twitch()
                    .with_fractional_pcsa(0.5)
                    .with_motor_units(5),
                FiberTypeConfig::fast_twitch()
                    .with_fractional_pcsa(0.5)
                    .with_motor_units(5),
            ],
        }
    }
}

impl MuscleConfig {
    /// A muscle made of a single fiber type covering the whole PCSA.
    #[must_use]
    pub fn single_fiber_type(fiber: FiberTypeConfig) -> Self {
        Self {
            fiber_types: vec![fiber.with_fractional_pcsa(1.0)],
            ..Self::default()
        }
    }

    /// Set the fiber types.
    #[must_use]
    pub fn with_fiber_types(mut self, fiber_types: Vec<FiberTypeConfig>) -> Self {
        self.fiber_types = fiber_types;
        self
    }

    /// Set the recruitment scheme.
    #[must_use]
    pub fn with_recruitment(mut self, recruitment: RecruitmentType) -> Self {
        self.recruitment = recruitment;
        self
    }

    /// Set the apportionment policy.
    #[must_use]
    pub fn with_apportionment(mut self, apportionment: ApportionMethod) -> Self {
        self.apportionment = apportionment;
        self
    }

    /// Set the optional outputs.
    #[must_use]
    pub fn with_outputs(mut self, outputs: OutputSelection) -> Self {
        self.outputs = outputs;
        self
    }

    /// Set the numerical guard policy.
    #[must_use]
    pub fn with_numeric_guard(mut self, guard: NumericGuard) -> Self {
        self.numeric_guard = guard;
        self
    }

    /// Set the activation at full recruitment.
    #[must_use]
    pub fn with_full_recruitment_at(mut self, ur: f64) -> Self {
        self.ur = ur;
        self
    }

    /// Set the musculotendon morphometry (g, cm, cm, cm).
    #[must_use]
    pub fn with_morphometry(
        mut self,
        mass: f64,
        optimal_fascicle_length: f64,
        tendon_slack_length: f64,
        max_path_length: f64,
    ) -> Self {
        self.mass = mass;
        self.optimal_fascicle_length = optimal_fascicle_length;
        self.tendon_slack_length = tendon_slack_length;
        self.max_path_length = max_path_length;
        self
    }

    /// Number of fiber types.
    #[must_use]
    pub fn fiber_type_count(&self) -> usize {
        self.fiber_types.len()
    }

    /// Total number of motor units across fiber types.
    #[must_use]
    pub fn total_motor_units(&self) -> usize {
        self.fiber_types.iter().map(|f| f.motor_units).sum()
    }

    /// Sum of fractional PCSA over fiber types.
    #[must_use]
    pub fn total_fractional_pcsa(&self) -> f64 {
        self.fiber_types.iter().map(|f| f.fractional_pcsa).sum()
    }

    /// Check the configuration for shape and range errors.
    ///
    /// This is the only place configuration errors are raised; a muscle that
    /// passed validation never fails while stepping.
    pub fn validate(&self) -> Result<()> {
        if self.fiber_types.is_empty() {
            return Err(MuscleError::NoFiberTypes);
        }

        positive("MMASS", self.mass)?;
        positive("FASCL0", self.optimal_fascicle_length)?;
        positive("TENDL0T", self.tendon_slack_length)?;
        positive("LPATH", self.max_path_length)?;
        positive("SPTEN", self.specific_tension)?;
        positive("C1", self.c1)?;
        positive("K1", self.k1)?;
        positive("CT", self.c_t)?;
        positive("KT", self.k_t)?;
        positive("UR", self.ur)?;

        for fiber in &self.fiber_types {
            fiber.validate()?;
        }

        let total = self.total_fractional_pcsa();
        if total > 1.0 + PCSA_SUM_TOLERANCE {
            return Err(MuscleError::FractionalPcsaExceeded { total });
        }
        if total < 1.0 - PCSA_SUM_TOLERANCE {
            warn!(total, "fractional PCSA sums to less than 1");
        }

        match &self.apportionment {
            ApportionMethod::Manual { weights } => {
                let expected = self.total_motor_units();
                if weights.len() != expected {
                    return Err(MuscleError::count("UPCSA", expected, weights.len()));
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(MuscleError::invalid(
                        "UPCSA",
                        "unit PCSA weights must be finite and non-negative",
                    ));
                }
            }
            ApportionMethod::Geometric { growth } => {
                if !growth.is_finite() || *growth <= -1.0 {
                    return Err(MuscleError::invalid(
                        "GEOPCSA",
                        format!("growth factor {growth} must be greater than -1"),
                    ));
                }
            }
            ApportionMethod::RankWeighted => {
                for fiber in &self.fiber_types {
                    if !fiber.recruitment_rank.is_finite() || fiber.recruitment_rank < 0.0 {
                        return Err(MuscleError::invalid(
                            "RRANK",
                            format!("fiber type `{}` has a negative rank", fiber.name),
                        ));
                    }
                }
            }
            ApportionMethod::Equal => {}
        }

        Ok(())
    }
}

fn positive(parameter: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MuscleError::invalid(
            parameter,
            format!("must be positive and finite, got {value}"),
        ))
    }
}
