//! Flat parameter table in the layout used by block-diagram hosts.
//!
//! Hosts that embed the muscle as a block pass its parameters as a list of
//! numeric arrays: scalars for the muscle, one array entry per fiber type for
//! the fiber constants, one entry per motor unit for manual PCSA weights, and
//! numeric selectors for the recruitment scheme, the apportionment policy and
//! the optional output ports. [`ParameterSet`] mirrors that table, and its
//! conversion into a [`MuscleConfig`] performs the shape checks a host would
//! report as parameter errors.
//!
//! ```
//! use sim_virtual_muscle::{MuscleConfig, ParameterSet};
//!
//! let params = ParameterSet::from(&MuscleConfig::default());
//! let config = MuscleConfig::try_from(params)?;
//! assert_eq!(config.fiber_type_count(), 2);
//! # Ok::<(), sim_virtual_muscle::MuscleError>(())
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::apportion::apportion;
use crate::config::{
    ApportionMethod, FiberTypeConfig, MuscleConfig, NumericGuard, OutputSelection,
    RecruitmentType,
};
use crate::error::{MuscleError, Result};

/// Number of entries of the output-port selector (force plus four extras).
pub const OUTPUT_PORT_ENTRIES: usize = 5;

/// Host-style parameter table.
///
/// Per-fiber-type arrays must all have [`fiber_types`](Self::fiber_types)
/// entries. Selector values follow the host encoding: recruitment type
/// 2/3/4, apportionment 1 (manual) to 4 (geometric), and a non-zero output
/// entry enabling the port.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub struct ParameterSet {
    pub fiber_types: usize,
    pub fiber_names: Vec<String>,

    pub specific_tension: f64,
    pub viscosity: f64,
    pub c1: f64,
    pub k1: f64,
    pub lr1: f64,
    pub c2: f64,
    pub k2: f64,
    pub lr2: f64,
    pub c_t: f64,
    pub k_t: f64,
    pub lr_t: f64,

    pub recruitment_rank: Vec<f64>,
    pub f_half: Vec<f64>,
    pub f_min: Vec<f64>,
    pub f_max: Vec<f64>,
    pub fl_omega: Vec<f64>,
    pub fl_beta: Vec<f64>,
    pub fl_rho: Vec<f64>,
    pub v_max: Vec<f64>,
    pub cv0: Vec<f64>,
    pub cv1: Vec<f64>,
    pub av0: Vec<f64>,
    pub av1: Vec<f64>,
    pub av2: Vec<f64>,
    pub bv: Vec<f64>,
    pub af: Vec<f64>,
    pub nf0: Vec<f64>,
    pub nf1: Vec<f64>,
    pub tf1: Vec<f64>,
    pub tf2: Vec<f64>,
    pub tf3: Vec<f64>,
    pub tf4: Vec<f64>,
    pub a_s1: Vec<f64>,
    pub a_s2: Vec<f64>,
    pub t_s: Vec<f64>,
    pub c_y: Vec<f64>,
    pub v_y: Vec<f64>,

    pub recruitment_type: f64,
    pub output_ports: Vec<f64>,

    pub mass: f64,
    pub optimal_fascicle_length: f64,
    pub tendon_slack_length: f64,
    pub max_path_length: f64,
    pub ur: f64,

    /// Motor units per fiber type. Whole numbers only.
    pub motor_units: Vec<f64>,
    pub fractional_pcsa: Vec<f64>,
    /// Unit PCSA weights, one per motor unit. Only the manual
    /// apportionment reads them, but every table must carry the full count.
    pub unit_pcsa: Vec<f64>,
    pub apportion_method: f64,
    pub geometric_growth: f64,

    /// Not part of the host table; clamping is on by default.
    pub numeric_guard: NumericGuard,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::from(&MuscleConfig::default())
    }
}

impl From<&MuscleConfig> for ParameterSet {
    fn from(config: &MuscleConfig) -> Self {
        let column = |field: fn(&FiberTypeConfig) -> f64| -> Vec<f64> {
            config.fiber_types.iter().map(field).collect()
        };
        let flag = |on: bool| if on { 1.0 } else { 0.0 };

        let (apportion_method, geometric_growth) = match &config.apportionment {
            ApportionMethod::Manual { .. } => (1.0, 0.0),
            ApportionMethod::RankWeighted => (2.0, 0.0),
            ApportionMethod::Equal => (3.0, 0.0),
            ApportionMethod::Geometric { growth } => (4.0, *growth),
        };
        let unit_pcsa = apportion(&config.fiber_types, &config.apportionment);

        Self {
            fiber_types: config.fiber_types.len(),
            fiber_names: config.fiber_types.iter().map(|f| f.name.clone()).collect(),
            specific_tension: config.specific_tension,
            viscosity: config.viscosity,
            c1: config.c1,
            k1: config.k1,
            lr1: config.lr1,
            c2: config.c2,
            k2: config.k2,
            lr2: config.lr2,
            c_t: config.c_t,
            k_t: config.k_t,
            lr_t: config.lr_t,
            recruitment_rank: column(|f| f.recruitment_rank),
            f_half: column(|f| f.f_half),
            f_min: column(|f| f.f_min),
            f_max: column(|f| f.f_max),
            fl_omega: column(|f| f.fl_omega),
            fl_beta: column(|f| f.fl_beta),
            fl_rho: column(|f| f.fl_rho),
            v_max: column(|f| f.v_max),
            cv0: column(|f| f.cv0),
            cv1: column(|f| f.cv1),
            av0: column(|f| f.av0),
            av1: column(|f| f.av1),
            av2: column(|f| f.av2),
            bv: column(|f| f.bv),
            af: column(|f| f.af),
            nf0: column(|f| f.nf0),
            nf1: column(|f| f.nf1),
            tf1: column(|f| f.tf1),
            tf2: column(|f| f.tf2),
            tf3: column(|f| f.tf3),
            tf4: column(|f| f.tf4),
            a_s1: column(|f| f.a_s1),
            a_s2: column(|f| f.a_s2),
            t_s: column(|f| f.t_s),
            c_y: column(|f| f.c_y),
            v_y: column(|f| f.v_y),
            recruitment_type: match config.recruitment {
                RecruitmentType::DiscreteNatural => 2.0,
                RecruitmentType::ContinuousNatural => 3.0,
                RecruitmentType::IntramuscularFes => 4.0,
            },
            output_ports: vec![
                1.0,
                flag(config.outputs.activation),
                flag(config.outputs.normalized_force),
                flag(config.outputs.fascicle_length),
                flag(config.outputs.fascicle_velocity),
            ],
            mass: config.mass,
            optimal_fascicle_length: config.optimal_fascicle_length,
            tendon_slack_length: config.tendon_slack_length,
            max_path_length: config.max_path_length,
            ur: config.ur,
            motor_units: config
                .fiber_types
                .iter()
                .map(|f| f.motor_units as f64)
                .collect(),
            fractional_pcsa: column(|f| f.fractional_pcsa),
            unit_pcsa,
            apportion_method,
            geometric_growth,
            numeric_guard: config.numeric_guard,
        }
    }
}

impl ParameterSet {
    fn check_shapes(&self) -> Result<()> {
        if self.fiber_types == 0 {
            return Err(MuscleError::NoFiberTypes);
        }
        let n = self.fiber_types;

        let per_type: [(&'static str, &[f64]); 28] = [
            ("RRANK", &self.recruitment_rank),
            ("F05", &self.f_half),
            ("FMIN", &self.f_min),
            ("FMAX", &self.f_max),
            ("FLOMEGA", &self.fl_omega),
            ("FLBETA", &self.fl_beta),
            ("FLRHO", &self.fl_rho),
            ("VMAX", &self.v_max),
            ("CV0", &self.cv0),
            ("CV1", &self.cv1),
            ("AV0", &self.av0),
            ("AV1", &self.av1),
            ("AV2", &self.av2),
            ("BV", &self.bv),
            ("AF", &self.af),
            ("NF0", &self.nf0),
            ("NF1", &self.nf1),
            ("TF1", &self.tf1),
            ("TF2", &self.tf2),
            ("TF3", &self.tf3),
            ("TF4", &self.tf4),
            ("AS1", &self.a_s1),
            ("AS2", &self.a_s2),
            ("TS", &self.t_s),
            ("CY", &self.c_y),
            ("VY", &self.v_y),
            ("NUMOFUNITS", &self.motor_units),
            ("FPCSA", &self.fractional_pcsa),
        ];
        for (parameter, values) in per_type {
            if values.len() != n {
                return Err(MuscleError::count(parameter, n, values.len()));
            }
        }

        if !self.fiber_names.is_empty() && self.fiber_names.len() != n {
            return Err(MuscleError::count("NAMES", n, self.fiber_names.len()));
        }
        if self.output_ports.len() != OUTPUT_PORT_ENTRIES {
            return Err(MuscleError::count(
                "ADDPORTS",
                OUTPUT_PORT_ENTRIES,
                self.output_ports.len(),
            ));
        }
        Ok(())
    }

    fn motor_unit_counts(&self) -> Result<Vec<usize>> {
        self.motor_units
            .iter()
            .map(|&count| {
                if count.is_finite() && count >= 1.0 && count.fract() == 0.0 {
                    Ok(count as usize)
                } else {
                    Err(MuscleError::invalid(
                        "NUMOFUNITS",
                        format!("motor unit count {count} is not a positive whole number"),
                    ))
                }
            })
            .collect()
    }

    fn fiber_type(&self, i: usize, motor_units: usize) -> FiberTypeConfig {
        let name = self
            .fiber_names
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("type {}", i + 1));

        FiberTypeConfig {
            name,
            recruitment_rank: self.recruitment_rank[i],
            fractional_pcsa: self.fractional_pcsa[i],
            motor_units,
            f_half: self.f_half[i],
            f_min: self.f_min[i],
            f_max: self.f_max[i],
            fl_omega: self.fl_omega[i],
            fl_beta: self.fl_beta[i],
            fl_rho: self.fl_rho[i],
            v_max: self.v_max[i],
            cv0: self.cv0[i],
            cv1: self.cv1[i],
            av0: self.av0[i],
            av1: self.av1[i],
            av2: self.av2[i],
            bv: self.bv[i],
            af: self.af[i],
            nf0: self.nf0[i],
            nf1: self.nf1[i],
            tf1: self.tf1[i],
            tf2: self.tf2[i],
            tf3: self.tf3[i],
            tf4: self.tf4[i],
            c_y: self.c_y[i],
            v_y: self.v_y[i],
            a_s1: self.a_s1[i],
            a_s2: self.a_s2[i],
            t_s: self.t_s[i],
        }
    }
}

impl TryFrom<ParameterSet> for MuscleConfig {
    type Error = MuscleError;

    fn try_from(params: ParameterSet) -> Result<Self> {
        params.check_shapes()?;

        let counts = params.motor_unit_counts()?;
        let total_units: usize = counts.iter().sum();

        if params.unit_pcsa.len() != total_units {
            return Err(MuscleError::count("UPCSA", total_units, params.unit_pcsa.len()));
        }
        let recruitment = RecruitmentType::from_selector(params.recruitment_type)?;
        let apportionment = ApportionMethod::from_selector(
            params.apportion_method,
            params.unit_pcsa.clone(),
            params.geometric_growth,
        )?;

        let ports = &params.output_ports;
        let outputs = OutputSelection {
            activation: ports[1] != 0.0,
            normalized_force: ports[2] != 0.0,
            fascicle_length: ports[3] != 0.0,
            fascicle_velocity: ports[4] != 0.0,
        };

        let fiber_types = counts
            .iter()
            .enumerate()
            .map(|(i, &units)| params.fiber_type(i, units))
            .collect();

        let config = Self {
            mass: params.mass,
            optimal_fascicle_length: params.optimal_fascicle_length,
            tendon_slack_length: params.tendon_slack_length,
            max_path_length: params.max_path_length,
            specific_tension: params.specific_tension,
            viscosity: params.viscosity,
            c1: params.c1,
            k1: params.k1,
            lr1: params.lr1,
            c2: params.c2,
            k2: params.k2,
            lr2: params.lr2,
            c_t: params.c_t,
            k_t: params.k_t,
            lr_t: params.lr_t,
            ur: params.ur,
            recruitment,
            apportionment,
            outputs,
            numeric_guard: params.numeric_guard,
            fiber_types,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::muscle::Muscle;

    #[test]
    fn test_default_table_converts_back() {
        let config = MuscleConfig::default();
        let params = ParameterSet::from(&config);
        assert_eq!(MuscleConfig::try_from(params), Ok(config));
    }

    #[test]
    fn test_every_selector_survives_conversion() {
        let config = MuscleConfig::default()
            .with_recruitment(RecruitmentType::IntramuscularFes)
            .with_apportionment(ApportionMethod::Geometric { growth: 0.3 })
            .with_outputs(OutputSelection {
                normalized_force: true,
                fascicle_velocity: true,
                ..OutputSelection::default()
            });
        let params = ParameterSet::from(&config);

        assert_eq!(params.recruitment_type, 4.0);
        assert_eq!(params.apportion_method, 4.0);
        assert_eq!(params.output_ports, vec![1.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(MuscleConfig::try_from(params), Ok(config));
    }

    #[test]
    fn test_per_type_array_length_checked() {
        let mut params = ParameterSet::default();
        params.f_max.push(2.0);
        assert_eq!(
            MuscleConfig::try_from(params),
            Err(MuscleError::count("FMAX", 2, 3))
        );
    }

    #[test]
    fn test_output_ports_length_checked() {
        let params = ParameterSet {
            output_ports: vec![1.0, 1.0],
            ..ParameterSet::default()
        };
        assert_eq!(
            MuscleConfig::try_from(params),
            Err(MuscleError::count("ADDPORTS", 5, 2))
        );
    }

    #[test]
    fn test_manual_weights_count_checked() {
        let params = ParameterSet {
            apportion_method: 1.0,
            unit_pcsa: vec![0.1; 4],
            ..ParameterSet::default()
        };
        assert_eq!(
            MuscleConfig::try_from(params),
            Err(MuscleError::count("UPCSA", 10, 4))
        );
    }

    #[test]
    fn test_unit_weights_count_checked_for_every_method() {
        for method in [2.0, 3.0, 4.0] {
            let params = ParameterSet {
                apportion_method: method,
                unit_pcsa: vec![0.1; 3],
                ..ParameterSet::default()
            };
            assert_eq!(
                MuscleConfig::try_from(params),
                Err(MuscleError::count("UPCSA", 10, 3))
            );
        }
    }

    #[test]
    fn test_table_carries_apportioned_weights() {
        let config = MuscleConfig::default();
        let params = ParameterSet::from(&config);

        assert_eq!(params.unit_pcsa.len(), 10);
        assert_eq!(params.unit_pcsa, Muscle::new(config).unwrap().unit_pcsa());
    }

    #[test]
    fn test_unknown_selectors_rejected() {
        let params = ParameterSet {
            recruitment_type: 1.0,
            ..ParameterSet::default()
        };
        assert!(matches!(
            MuscleConfig::try_from(params),
            Err(MuscleError::InvalidSelector { parameter: "RTYPE", .. })
        ));

        let params = ParameterSet {
            apportion_method: 5.0,
            ..ParameterSet::default()
        };
        assert!(matches!(
            MuscleConfig::try_from(params),
            Err(MuscleError::InvalidSelector { parameter: "APPORTMTD", .. })
        ));
    }

    #[test]
    fn test_fractional_unit_count_rejected() {
        let mut params = ParameterSet::default();
        params.motor_units[0] = 2.5;
        assert!(matches!(
            MuscleConfig::try_from(params),
            Err(MuscleError::InvalidParameter { parameter: "NUMOFUNITS", .. })
        ));
    }

    #[test]
    fn test_pcsa_sum_checked_after_conversion() {
        let params = ParameterSet {
            fractional_pcsa: vec![0.8, 0.8],
            ..ParameterSet::default()
        };
        assert!(matches!(
            MuscleConfig::try_from(params),
            Err(MuscleError::FractionalPcsaExceeded { .. })
        ));
    }

    #[test]
    fn test_missing_names_are_generated() {
        let params = ParameterSet {
            fiber_names: Vec::new(),
            ..ParameterSet::default()
        };
        let config = MuscleConfig::try_from(params).unwrap_or_default();
        assert_eq!(config.fiber_types[1].name, "type 2");
    }
}
