//! Error types for loss computation and configuration validation.
//!
//! Loss errors are contract violations between the rollout producer and the
//! loss module. They are fatal to the current call and never retried here;
//! the training driver decides whether to skip the batch or abort the run.

use std::fmt;

/// Failure of a single loss / estimator call.
#[derive(Debug, Clone, PartialEq)]
pub enum LossError {
    /// A required batch key is absent.
    MissingField {
        key: String,
    },
    /// Two tensors that must match elementwise have different shapes.
    ShapeMismatch {
        key: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// Structural problem with the batch itself (wrong channel count,
    /// flag vectors of the wrong length, empty batch).
    InvalidBatch {
        reason: String,
    },
}

impl LossError {
    pub fn missing(key: impl Into<String>) -> Self {
        LossError::MissingField { key: key.into() }
    }

    pub fn shape_mismatch(key: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        LossError::ShapeMismatch {
            key: key.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        LossError::InvalidBatch {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for LossError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossError::MissingField { key } => {
                write!(f, "missing required batch field '{}'", key)
            }
            LossError::ShapeMismatch {
                key,
                expected,
                actual,
            } => write!(
                f,
                "shape mismatch for '{}': expected {:?}, got {:?}",
                key, expected, actual
            ),
            LossError::InvalidBatch { reason } => write!(f, "invalid batch: {}", reason),
        }
    }
}

impl std::error::Error for LossError {}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A count parameter must be positive.
    InvalidCount { field: &'static str, value: usize },
    /// A parameter is outside its valid range.
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// A parameter has an otherwise invalid value (non-finite, empty key).
    InvalidValue { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidCount { field, value } => {
                write!(f, "{} must be > 0, got {}", field, value)
            }
            ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                write!(f, "{} must be in [{}, {}], got {}", field, min, max, value)
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid {}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Check that `value` is finite and within `[min, max]`.
pub(crate) fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
