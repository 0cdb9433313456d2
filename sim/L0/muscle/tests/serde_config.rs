//! Serialization of configurations and states.
//!
//! Run with: cargo test -p sim-virtual-muscle --features serde

#![cfg(feature = "serde")]
#![allow(clippy::unwrap_used)]

use sim_virtual_muscle::{
    ApportionMethod, Muscle, MuscleConfig, MuscleState, NumericGuard, ParameterSet,
    RecruitmentType,
};

#[test]
fn test_config_survives_json() {
    let config = MuscleConfig::default()
        .with_recruitment(RecruitmentType::ContinuousNatural)
        .with_apportionment(ApportionMethod::Geometric { growth: 0.25 })
        .with_numeric_guard(NumericGuard::Propagate);

    let json = serde_json::to_string(&config).unwrap();
    let restored: MuscleConfig = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, config);
}

#[test]
fn test_parameter_table_from_json() {
    let table = ParameterSet::default();
    let json = serde_json::to_string_pretty(&table).unwrap();
    let restored: ParameterSet = serde_json::from_str(&json).unwrap();

    let config = MuscleConfig::try_from(restored).unwrap();
    assert_eq!(config, MuscleConfig::default());
    assert!(Muscle::new(config).is_ok());
}

#[test]
fn test_malformed_table_rejected_after_parse() {
    let mut table = ParameterSet::default();
    table.f_half.pop();
    let json = serde_json::to_string(&table).unwrap();
    let restored: ParameterSet = serde_json::from_str(&json).unwrap();

    let err = MuscleConfig::try_from(restored).unwrap_err();
    assert!(err.is_configuration_error());
}

#[test]
fn test_state_snapshot() {
    let muscle = Muscle::new(MuscleConfig::default()).unwrap();
    let state = muscle.initial_state(0.09);

    let json = serde_json::to_string(&state).unwrap();
    let restored: MuscleState = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, state);
}
