//! Musculotendon coupling.
//!
//! The fascicle and the tendon are in series along the musculotendon path.
//! The tendon stretch is whatever part of the path the fascicle does not
//! cover, and the force imbalance between tendon and fascicle accelerates a
//! lumped mass equal to half the muscle mass:
//!
//! ```text
//!   path ├──── fascicle (Lce·L0) ────┼──── tendon (LT·L0T) ────┤
//!
//!   m/2 · d²Lce/dt² = Fse - Fce
//! ```
//!
//! The fascicle length and velocity states are kept in metres and m/s; the
//! constitutive laws work with lengths normalized by L0 (cm).

use crate::config::MuscleConfig;
use crate::curves::{CompressionElasticCurve, ParallelElasticCurve, SeriesElasticCurve};
use crate::error::{MuscleError, Result};

/// Muscle density (g/cm³).
pub const MUSCLE_DENSITY: f64 = 1.06;

/// Converts grams to kilograms and halves the mass.
pub const MASS_SCALE: f64 = 2000.0;

const CM_PER_M: f64 = 100.0;

/// Derived morphometry and passive elements of a musculotendon unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Musculotendon {
    /// Muscle mass (g).
    pub mass: f64,
    /// Optimal fascicle length L0 (cm).
    pub optimal_fascicle_length: f64,
    /// Tendon slack length L0T (cm).
    pub tendon_slack_length: f64,
    /// Physiological cross-sectional area (cm²).
    pub pcsa: f64,
    /// Maximal isometric force F0 (N).
    pub max_force: f64,
    /// Maximum normalized fascicle length (L0).
    pub max_fascicle_length: f64,
    /// FPE1.
    pub parallel: ParallelElasticCurve,
    /// FPE2.
    pub compression: CompressionElasticCurve,
    /// Tendon.
    pub tendon: SeriesElasticCurve,
}

impl Musculotendon {
    /// Derive the musculotendon constants from a validated configuration.
    ///
    /// The maximum fascicle length is the length reached when the whole
    /// path is stretched to its anatomical maximum: the tendon then carries
    /// the passive force of a fascicle at `Lce = 1`.
    pub fn new(config: &MuscleConfig) -> Result<Self> {
        let pcsa = config.mass / MUSCLE_DENSITY / config.optimal_fascicle_length;
        let max_force = pcsa * config.specific_tension;

        let tendon = SeriesElasticCurve::new(config);
        let passive = ParallelElasticCurve::new(config, 1.0).elastic(1.0);
        let tendon_at_max = tendon.length_at(passive) * config.tendon_slack_length;
        let max_fascicle_length =
            (config.max_path_length - tendon_at_max) / config.optimal_fascicle_length;

        if !max_fascicle_length.is_finite() || max_fascicle_length <= 0.0 {
            return Err(MuscleError::invalid(
                "LPATH",
                format!(
                    "path too short for the tendon, maximum fascicle length {max_fascicle_length}"
                ),
            ));
        }

        Ok(Self {
            mass: config.mass,
            optimal_fascicle_length: config.optimal_fascicle_length,
            tendon_slack_length: config.tendon_slack_length,
            pcsa,
            max_force,
            max_fascicle_length,
            parallel: ParallelElasticCurve::new(config, max_fascicle_length),
            compression: CompressionElasticCurve::new(config),
            tendon,
        })
    }

    /// Metres per unit of normalized fascicle length.
    #[must_use]
    pub fn length_scale(&self) -> f64 {
        self.optimal_fascicle_length / CM_PER_M
    }

    /// Normalized fascicle length (L0) from the state in metres.
    #[must_use]
    pub fn normalized_length(&self, fascicle_length: f64) -> f64 {
        fascicle_length / self.length_scale()
    }

    /// Normalized fascicle velocity (L0/s) from the state in m/s.
    #[must_use]
    pub fn normalized_velocity(&self, fascicle_velocity: f64) -> f64 {
        fascicle_velocity / self.length_scale()
    }

    /// Normalized tendon length (L0T) for a path (m) and normalized fascicle
    /// length.
    #[must_use]
    pub fn tendon_length(&self, path_length: f64, lce: f64) -> f64 {
        (path_length * CM_PER_M - self.optimal_fascicle_length * lce) / self.tendon_slack_length
    }

    /// Tendon force (N).
    #[must_use]
    pub fn tendon_force(&self, path_length: f64, lce: f64) -> f64 {
        self.tendon.evaluate(self.tendon_length(path_length, lce)) * self.max_force
    }

    /// Fascicle acceleration (m/s²) from the tendon and fascicle forces (N).
    #[must_use]
    pub fn fascicle_acceleration(&self, tendon_force: f64, fascicle_force: f64) -> f64 {
        (tendon_force - fascicle_force) / (self.mass / MASS_SCALE)
    }

    /// Fascicle length (m) at which the tendon and the passive fascicle are
    /// approximately in equilibrium for the given path (m).
    ///
    /// Both elastic elements are linearized around their stiff regime.
    #[must_use]
    pub fn initial_fascicle_length(&self, path_length: f64) -> f64 {
        let (c1, k1, lr1) = (self.parallel.c1, self.parallel.k1, self.parallel.lr1);
        let (c_t, k_t, lr_t) = (self.tendon.c_t, self.tendon.k_t, self.tendon.lr_t);
        let l0t = self.tendon_slack_length;

        let offset = k_t / k1 * lr1 - lr_t - k_t * (c1 / c_t * k1 / k_t).ln();
        let compliance = k_t / k1 * l0t / self.max_fascicle_length / self.optimal_fascicle_length;

        (path_length * CM_PER_M + l0t * offset) / (CM_PER_M * (1.0 + compliance))
    }
}
