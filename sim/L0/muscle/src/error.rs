//! Error types for muscle configuration and state handling.

use thiserror::Error;

/// Errors that can occur when building or driving a Virtual Muscle.
///
/// Every variant except [`MuscleError::StateLength`] and
/// [`MuscleError::NotConverged`] is a configuration error: it is reported
/// once, before any stepping happens, and is never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MuscleError {
    /// A muscle needs at least one fiber type.
    #[error("muscle has no fiber types")]
    NoFiberTypes,

    /// A per-fiber-type or per-unit array has the wrong number of entries.
    #[error("parameter `{parameter}` has {actual} entries, expected {expected}")]
    ParameterCount {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// Expected entry count.
        expected: usize,
        /// Actual entry count.
        actual: usize,
    },

    /// Fractional PCSA over all fiber types sums above 1.
    #[error("fractional PCSA sums to {total}, which exceeds 1")]
    FractionalPcsaExceeded {
        /// The offending sum.
        total: f64,
    },

    /// A scalar parameter is out of its physical range.
    #[error("invalid parameter `{parameter}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A numeric selector (recruitment type, apportion method) is unknown.
    #[error("unknown selector {value} for `{parameter}`")]
    InvalidSelector {
        /// Name of the selector.
        parameter: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A flat state vector does not match the muscle's layout.
    #[error("state vector has {actual} entries, expected {expected}")]
    StateLength {
        /// Expected length (5 per motor unit plus 3).
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// An implicit step's Newton iteration did not settle.
    #[error("implicit step did not converge after {iterations} iterations (last update {update:e})")]
    NotConverged {
        /// Iterations performed.
        iterations: usize,
        /// Norm of the last Newton update.
        update: f64,
    },
}

impl MuscleError {
    /// Creates a parameter count error.
    #[must_use]
    pub const fn count(parameter: &'static str, expected: usize, actual: usize) -> Self {
        Self::ParameterCount {
            parameter,
            expected,
            actual,
        }
    }

    /// Creates an invalid parameter error.
    #[must_use]
    pub fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter,
            reason: reason.into(),
        }
    }

    /// Creates a state length error.
    #[must_use]
    pub const fn state_length(expected: usize, actual: usize) -> Self {
        Self::StateLength { expected, actual }
    }

    /// Returns true if this error is raised while validating configuration.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        !matches!(self, Self::StateLength { .. } | Self::NotConverged { .. })
    }
}

/// Result type for muscle operations.
pub type Result<T> = std::result::Result<T, MuscleError>;
