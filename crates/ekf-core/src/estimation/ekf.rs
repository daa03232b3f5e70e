//! Extended Kalman Filter (EKF) implementation
//!
//! The filter owns its mean and covariance and is parameterised by a
//! [`SystemModel`] holding the motion/measurement functions and their
//! Jacobians. Both steps compute the new `(x, P)` into locals and only commit
//! them once every check has passed, so a failed call leaves the filter
//! untouched.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{FilterError, SystemModel};
use crate::math::{is_finite_matrix, is_finite_vector, joseph_update, reciprocal_condition};
use crate::{MEAS_DIM, STATE_DIM};

/// EKF state container
#[derive(Debug, Clone, PartialEq)]
pub struct EkfState {
    /// State estimate
    pub x: DVector<f64>,
    /// Covariance matrix
    pub p: DMatrix<f64>,
}

impl EkfState {
    /// Zero mean with identity covariance
    pub fn new(state_dim: usize) -> Self {
        Self {
            x: DVector::zeros(state_dim),
            p: DMatrix::identity(state_dim, state_dim),
        }
    }

    /// State from an initial mean and covariance
    ///
    /// Fails if `p` is not square with as many rows as `x`.
    pub fn with_initial(x: DVector<f64>, p: DMatrix<f64>) -> Result<Self, FilterError> {
        let n = x.len();
        FilterError::check_shape("covariance", (n, n), p.shape())?;
        Ok(Self { x, p })
    }

    /// State dimension
    pub fn dim(&self) -> usize {
        self.x.len()
    }
}

/// Expected vector/matrix sizes of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDimensions {
    /// Length of the state vector
    pub state: usize,
    /// Length of the measurement vector
    pub measurement: usize,
}

impl FilterDimensions {
    /// `[x, y, vx, vy]` state observed through a 2D position
    pub const PLANAR: Self = Self {
        state: STATE_DIM,
        measurement: MEAS_DIM,
    };

    pub fn new(state: usize, measurement: usize) -> Self {
        Self { state, measurement }
    }
}

impl Default for FilterDimensions {
    fn default() -> Self {
        Self::PLANAR
    }
}

/// Covariance correction used by the update step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceUpdate {
    /// P' = P - K H P
    ///
    /// Cheapest form. Can drift away from symmetry and positive
    /// definiteness under round-off over long runs.
    #[default]
    Simple,
    /// P' = (I - KH) P (I - KH)ᵀ + K R Kᵀ
    Joseph,
}

/// EKF options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EkfOptions {
    /// Time step [s]. Stored for the caller; the recursion does not read it.
    pub dt: f64,
    /// Smallest accepted reciprocal condition number of S
    pub singular_tolerance: f64,
    /// Covariance correction form
    pub covariance_update: CovarianceUpdate,
}

impl Default for EkfOptions {
    fn default() -> Self {
        Self {
            dt: 1.0,
            singular_tolerance: 1e-12,
            covariance_update: CovarianceUpdate::Simple,
        }
    }
}

impl EkfOptions {
    /// Check option ranges
    pub fn validate(&self) -> Result<(), FilterError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(FilterError::InvalidOptions(format!(
                "dt must be positive and finite, got {}",
                self.dt
            )));
        }
        if !self.singular_tolerance.is_finite() || self.singular_tolerance < 0.0 {
            return Err(FilterError::InvalidOptions(format!(
                "singular_tolerance must be non-negative and finite, got {}",
                self.singular_tolerance
            )));
        }
        Ok(())
    }
}

/// Diagnostics of the most recent successful update
#[derive(Debug, Clone, PartialEq)]
pub struct Innovation {
    /// v = y - h(x)
    pub residual: DVector<f64>,
    /// S = H P Hᵀ + R
    pub covariance: DMatrix<f64>,
    /// K = P Hᵀ S⁻¹
    pub gain: DMatrix<f64>,
    /// Normalized innovation squared, vᵀ S⁻¹ v
    pub nis: f64,
}

/// Extended Kalman Filter
#[derive(Debug)]
pub struct ExtendedKalmanFilter {
    /// Current state estimate and covariance
    state: EkfState,
    /// Process noise covariance (Q)
    q: DMatrix<f64>,
    /// Measurement noise covariance (R)
    r: DMatrix<f64>,
    /// f, F, h, H
    model: SystemModel,
    dims: FilterDimensions,
    options: EkfOptions,
    last_innovation: Option<Innovation>,
}

impl ExtendedKalmanFilter {
    /// Create a planar EKF: 4-element state `[x, y, vx, vy]`, 2-element measurement
    ///
    /// # Arguments
    /// * `initial_state` - Initial mean (4)
    /// * `initial_covariance` - Initial covariance (4x4)
    /// * `process_noise` - Q (4x4)
    /// * `measurement_noise` - R (2x2)
    /// * `model` - Motion/measurement functions and Jacobians
    pub fn new(
        initial_state: DVector<f64>,
        initial_covariance: DMatrix<f64>,
        process_noise: DMatrix<f64>,
        measurement_noise: DMatrix<f64>,
        model: SystemModel,
    ) -> Result<Self, FilterError> {
        Self::with_dimensions(
            FilterDimensions::PLANAR,
            initial_state,
            initial_covariance,
            process_noise,
            measurement_noise,
            model,
        )
    }

    /// Create an EKF with arbitrary state and measurement sizes
    pub fn with_dimensions(
        dims: FilterDimensions,
        initial_state: DVector<f64>,
        initial_covariance: DMatrix<f64>,
        process_noise: DMatrix<f64>,
        measurement_noise: DMatrix<f64>,
        model: SystemModel,
    ) -> Result<Self, FilterError> {
        let n = dims.state;
        let m = dims.measurement;

        FilterError::check_shape("initial state", (n, 1), initial_state.shape())?;
        FilterError::check_shape("initial covariance", (n, n), initial_covariance.shape())?;
        FilterError::check_shape("process noise", (n, n), process_noise.shape())?;
        FilterError::check_shape("measurement noise", (m, m), measurement_noise.shape())?;

        if !is_finite_vector(&initial_state)
            || !is_finite_matrix(&initial_covariance)
            || !is_finite_matrix(&process_noise)
            || !is_finite_matrix(&measurement_noise)
        {
            return Err(FilterError::NonFiniteResult { stage: "initial conditions" });
        }

        Ok(Self {
            state: EkfState {
                x: initial_state,
                p: initial_covariance,
            },
            q: process_noise,
            r: measurement_noise,
            model,
            dims,
            options: EkfOptions::default(),
            last_innovation: None,
        })
    }

    /// Replace the filter options
    pub fn with_options(mut self, options: EkfOptions) -> Result<Self, FilterError> {
        options.validate()?;
        self.options = options;
        Ok(self)
    }

    /// Set the time step
    pub fn with_dt(self, dt: f64) -> Result<Self, FilterError> {
        let options = EkfOptions {
            dt,
            ..self.options.clone()
        };
        self.with_options(options)
    }

    /// Prediction step
    ///
    /// Fk = F(x), x = f(x), P = Fk P Fkᵀ + Q
    pub fn predict(&mut self) -> Result<&EkfState, FilterError> {
        let n = self.dims.state;

        // Jacobian at the current estimate, before x is propagated
        let f_mat = self.model.transition_jacobian(&self.state.x);
        FilterError::check_shape("transition Jacobian", (n, n), f_mat.shape())?;

        let x_pred = self.model.transition(&self.state.x);
        FilterError::check_shape("predicted state", (n, 1), x_pred.shape())?;

        let p_pred = &f_mat * &self.state.p * f_mat.transpose() + &self.q;

        if !is_finite_vector(&x_pred) || !is_finite_matrix(&p_pred) {
            return Err(FilterError::NonFiniteResult { stage: "predict" });
        }

        self.state = EkfState { x: x_pred, p: p_pred };
        self.last_innovation = None;
        trace!(x = ?self.state.x.as_slice(), "ekf predict");

        Ok(&self.state)
    }

    /// Update step with measurement `y`
    ///
    /// v = y - h(x), Hk = H(x), S = Hk P Hkᵀ + R, K = P Hkᵀ S⁻¹,
    /// x = x + K v, then P is corrected per [`CovarianceUpdate`].
    pub fn update(&mut self, y: &DVector<f64>) -> Result<&EkfState, FilterError> {
        let n = self.dims.state;
        let m = self.dims.measurement;

        FilterError::check_shape("measurement", (m, 1), y.shape())?;

        // Jacobian first: its shape tells whether h fits this filter
        let h_mat = self.model.measurement_jacobian(&self.state.x);
        FilterError::check_shape("measurement Jacobian", (m, n), h_mat.shape())?;

        let z_pred = self.model.measure(&self.state.x);
        FilterError::check_shape("predicted measurement", (m, 1), z_pred.shape())?;

        // Innovation
        let v = self.model.residual(y, &z_pred);
        FilterError::check_shape("innovation", (m, 1), v.shape())?;
        if !is_finite_vector(&v) {
            return Err(FilterError::NonFiniteResult { stage: "innovation" });
        }

        // Innovation covariance: S = H * P * H' + R
        let s = &h_mat * &self.state.p * h_mat.transpose() + &self.r;
        if !is_finite_matrix(&s) {
            return Err(FilterError::NonFiniteResult { stage: "innovation covariance" });
        }

        let tolerance = self.options.singular_tolerance;
        let rcond = reciprocal_condition(&s);
        if rcond < tolerance {
            debug!(rcond, tolerance, "rejecting update: innovation covariance is singular");
            return Err(FilterError::SingularInnovationCovariance { rcond, tolerance });
        }
        let s_inv = s
            .clone()
            .try_inverse()
            .ok_or(FilterError::SingularInnovationCovariance { rcond, tolerance })?;

        // Kalman gain: K = P * H' * S^(-1)
        let k = &self.state.p * h_mat.transpose() * &s_inv;

        let x_new = &self.state.x + &k * &v;
        let p_new = match self.options.covariance_update {
            CovarianceUpdate::Simple => &self.state.p - &k * &h_mat * &self.state.p,
            CovarianceUpdate::Joseph => joseph_update(&self.state.p, &k, &h_mat, &self.r),
        };

        if !is_finite_vector(&x_new) || !is_finite_matrix(&p_new) {
            return Err(FilterError::NonFiniteResult { stage: "update" });
        }

        let nis = v.dot(&(&s_inv * &v));
        trace!(nis, x = ?x_new.as_slice(), "ekf update");

        self.last_innovation = Some(Innovation {
            residual: v,
            covariance: s,
            gain: k,
            nis,
        });
        self.state = EkfState { x: x_new, p: p_new };

        Ok(&self.state)
    }

    /// Current state and covariance
    pub fn state(&self) -> &EkfState {
        &self.state
    }

    /// Get current state estimate
    pub fn state_estimate(&self) -> &DVector<f64> {
        &self.state.x
    }

    /// Get current covariance
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.state.p
    }

    pub fn process_noise(&self) -> &DMatrix<f64> {
        &self.q
    }

    pub fn measurement_noise(&self) -> &DMatrix<f64> {
        &self.r
    }

    pub fn dimensions(&self) -> FilterDimensions {
        self.dims
    }

    pub fn options(&self) -> &EkfOptions {
        &self.options
    }

    /// Configured time step
    pub fn dt(&self) -> f64 {
        self.options.dt
    }

    /// Innovation of the last successful update, if any
    ///
    /// Failed updates leave it as it was. `predict` clears it, so after a
    /// prediction this is `None` until the next successful update.
    pub fn last_innovation(&self) -> Option<&Innovation> {
        self.last_innovation.as_ref()
    }
}
