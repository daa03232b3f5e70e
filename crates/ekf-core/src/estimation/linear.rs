//! Linear Kalman filter
//!
//! The special case of the EKF where the motion model is x_next = A x and the
//! measurement model is z = C x, with A and C constant. The gain is obtained
//! through a Cholesky solve of S instead of an explicit inverse.

use nalgebra::{DMatrix, DVector};

use super::{EkfState, FilterError, SystemModel};
use crate::math::{is_finite_matrix, is_finite_vector, reciprocal_condition};

/// Kalman filter with constant transition and observation matrices
#[derive(Debug, Clone)]
pub struct LinearKalmanFilter {
    /// Current state estimate and covariance
    state: EkfState,
    /// State transition matrix (A)
    a: DMatrix<f64>,
    /// Observation matrix (C)
    c: DMatrix<f64>,
    /// Process noise covariance (Q)
    q: DMatrix<f64>,
    /// Measurement noise covariance (R)
    r: DMatrix<f64>,
}

impl LinearKalmanFilter {
    /// Create a new linear Kalman filter
    ///
    /// Dimensions are taken from `a` (n x n) and `c` (m x n); every other
    /// input must agree with them.
    pub fn new(
        initial: EkfState,
        a: DMatrix<f64>,
        c: DMatrix<f64>,
        q: DMatrix<f64>,
        r: DMatrix<f64>,
    ) -> Result<Self, FilterError> {
        let n = a.nrows();
        let m = c.nrows();

        FilterError::check_shape("transition matrix", (n, n), a.shape())?;
        FilterError::check_shape("observation matrix", (m, n), c.shape())?;
        FilterError::check_shape("initial state", (n, 1), initial.x.shape())?;
        FilterError::check_shape("initial covariance", (n, n), initial.p.shape())?;
        FilterError::check_shape("process noise", (n, n), q.shape())?;
        FilterError::check_shape("measurement noise", (m, m), r.shape())?;

        Ok(Self { state: initial, a, c, q, r })
    }

    /// Equivalent EKF model: f(x) = A x, F = A, h(x) = C x, H = C
    pub fn system_model(&self) -> SystemModel {
        let (a, a_jac) = (self.a.clone(), self.a.clone());
        let (c, c_jac) = (self.c.clone(), self.c.clone());
        SystemModel::new(
            move |x: &DVector<f64>| &a * x,
            move |_x: &DVector<f64>| a_jac.clone(),
            move |x: &DVector<f64>| &c * x,
            move |_x: &DVector<f64>| c_jac.clone(),
        )
    }

    /// Prediction step: x = A x, P = A P Aᵀ + Q
    pub fn predict(&mut self) -> Result<&EkfState, FilterError> {
        let x = &self.a * &self.state.x;
        let p = &self.a * &self.state.p * self.a.transpose() + &self.q;

        if !is_finite_vector(&x) || !is_finite_matrix(&p) {
            return Err(FilterError::NonFiniteResult { stage: "predict" });
        }

        self.state = EkfState { x, p };
        Ok(&self.state)
    }

    /// Update step: S = C P Cᵀ + R, K = P Cᵀ S⁻¹, x = x + K (y - C x), P = P - K C P
    pub fn update(&mut self, y: &DVector<f64>) -> Result<&EkfState, FilterError> {
        FilterError::check_shape("measurement", (self.c.nrows(), 1), y.shape())?;

        let innovation = y - &self.c * &self.state.x;
        let cp = &self.c * &self.state.p;
        let s = &cp * self.c.transpose() + &self.r;

        let chol = s.clone().cholesky().ok_or_else(|| FilterError::SingularInnovationCovariance {
            rcond: reciprocal_condition(&s),
            tolerance: 0.0,
        })?;

        // Kᵀ = S⁻¹ C P, since S and P are symmetric
        let k = chol.solve(&cp).transpose();

        let x = &self.state.x + &k * innovation;
        let p = &self.state.p - &k * &cp;

        if !is_finite_vector(&x) || !is_finite_matrix(&p) {
            return Err(FilterError::NonFiniteResult { stage: "update" });
        }

        self.state = EkfState { x, p };
        Ok(&self.state)
    }

    pub fn state(&self) -> &EkfState {
        &self.state
    }

    pub fn state_estimate(&self) -> &DVector<f64> {
        &self.state.x
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.state.p
    }
}
