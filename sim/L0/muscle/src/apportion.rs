//! Motor-unit PCSA apportionment.
//!
//! Splits each fiber type's fractional PCSA over its motor units. The
//! resulting weights are computed once when a muscle is built and are
//! read-only afterwards; every force and recruitment computation reads them.
//!
//! Weights are laid out fiber-type-major: all units of the first fiber type,
//! then all units of the second, and so on.

use tracing::debug;

use crate::config::{ApportionMethod, FiberTypeConfig};

/// Compute one PCSA weight per motor unit.
///
/// For every policy except [`ApportionMethod::Manual`], the weights of a
/// fiber type sum to that type's fractional PCSA. Manual weights are used
/// as given; their length is checked by
/// [`MuscleConfig::validate`](crate::MuscleConfig::validate).
#[must_use]
pub fn apportion(fiber_types: &[FiberTypeConfig], method: &ApportionMethod) -> Vec<f64> {
    let weights = match method {
        ApportionMethod::Manual { weights } => weights.clone(),
        ApportionMethod::RankWeighted => fiber_types
            .iter()
            .flat_map(|fiber| {
                let rank = fiber.recruitment_rank;
                normalized(fiber, move |j| rank + j as f64 + 1.0)
            })
            .collect(),
        ApportionMethod::Equal => fiber_types
            .iter()
            .flat_map(|fiber| {
                let share = fiber.fractional_pcsa / fiber.motor_units as f64;
                std::iter::repeat_n(share, fiber.motor_units)
            })
            .collect(),
        ApportionMethod::Geometric { growth } => {
            let ratio = 1.0 + growth;
            fiber_types
                .iter()
                .flat_map(|fiber| normalized(fiber, move |j| ratio.powi(j as i32)))
                .collect()
        }
    };

    debug!(
        method = method_name(method),
        units = weights.len(),
        "apportioned motor-unit PCSA"
    );

    weights
}

/// Scale raw per-unit sizes so that they sum to the fiber type's fractional PCSA.
fn normalized(fiber: &FiberTypeConfig, size: impl Fn(usize) -> f64) -> Vec<f64> {
    let sizes: Vec<f64> = (0..fiber.motor_units).map(size).collect();
    let total: f64 = sizes.iter().sum();
    if total <= 0.0 {
        return vec![0.0; fiber.motor_units];
    }
    sizes
        .into_iter()
        .map(|s| fiber.fractional_pcsa * s / total)
        .collect()
}

fn method_name(method: &ApportionMethod) -> &'static str {
    match method {
        ApportionMethod::Manual { .. } => "manual",
        ApportionMethod::RankWeighted => "rank-weighted",
        ApportionMethod::Equal => "equal",
        ApportionMethod::Geometric { .. } => "geometric",
    }
}
