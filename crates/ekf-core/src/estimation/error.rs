//! Estimator errors

use thiserror::Error;

/// Errors reported by the estimators
///
/// None of these are retried internally. Whenever one is returned the
/// filter's `(x, P)` is exactly what it was before the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("Dimension mismatch for {what}: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("Innovation covariance is singular (rcond = {rcond:e}, tolerance = {tolerance:e})")]
    SingularInnovationCovariance { rcond: f64, tolerance: f64 },
    #[error("Non-finite value in {stage}")]
    NonFiniteResult { stage: &'static str },
    #[error("Invalid filter options: {0}")]
    InvalidOptions(String),
}

impl FilterError {
    /// Shape check shared by the estimators: `(rows, cols)` must equal `expected`
    pub(crate) fn check_shape(
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Result<(), FilterError> {
        if expected == actual {
            Ok(())
        } else {
            Err(FilterError::DimensionMismatch { what, expected, actual })
        }
    }
}
