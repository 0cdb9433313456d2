//! Integration tests for the Virtual Muscle actuator.
//!
//! These tests drive whole muscles through the host loop:
//! - Recruitment: thresholds, force ramps, activation-level smoothing
//! - Stimulation: frequency-driven activation
//! - Adaptation: yield and sag time courses
//! - Host: reinitialization, output ports, parameter tables

pub mod adaptation;
pub mod host;
pub mod recruitment;
pub mod stimulation;
