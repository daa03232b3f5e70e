//! Model callbacks injected into the EKF
//!
//! The estimator is parameterised by four functions:
//! - `f`: state transition, x_next = f(x)
//! - `F`: Jacobian of f at x
//! - `h`: measurement function, z = h(x)
//! - `H`: Jacobian of h at x
//!
//! Callbacks are expected to be pure and deterministic.

use std::fmt;

use crate::{Matrix, Vector};

/// Vector-valued model function (`f` or `h`)
pub type ModelFn = Box<dyn Fn(&Vector) -> Vector + Send + Sync>;

/// Matrix-valued Jacobian function (`F` or `H`)
pub type JacobianFn = Box<dyn Fn(&Vector) -> Matrix + Send + Sync>;

/// Measurement residual function, `v = residual(y, h(x))`
pub type ResidualFn = Box<dyn Fn(&Vector, &Vector) -> Vector + Send + Sync>;

/// Motion and measurement models with their Jacobians
pub struct SystemModel {
    transition: ModelFn,
    transition_jacobian: JacobianFn,
    measurement: ModelFn,
    measurement_jacobian: JacobianFn,
    residual: Option<ResidualFn>,
}

impl SystemModel {
    /// Bundle the four callbacks
    ///
    /// # Arguments
    /// * `f` - State transition function
    /// * `f_jacobian` - Jacobian of `f`
    /// * `h` - Measurement function
    /// * `h_jacobian` - Jacobian of `h`
    pub fn new<F, FJ, H, HJ>(f: F, f_jacobian: FJ, h: H, h_jacobian: HJ) -> Self
    where
        F: Fn(&Vector) -> Vector + Send + Sync + 'static,
        FJ: Fn(&Vector) -> Matrix + Send + Sync + 'static,
        H: Fn(&Vector) -> Vector + Send + Sync + 'static,
        HJ: Fn(&Vector) -> Matrix + Send + Sync + 'static,
    {
        Self {
            transition: Box::new(f),
            transition_jacobian: Box::new(f_jacobian),
            measurement: Box::new(h),
            measurement_jacobian: Box::new(h_jacobian),
            residual: None,
        }
    }

    /// Replace the plain difference `y - h(x)` with a custom residual
    ///
    /// Needed for measurements with angular components, where the
    /// difference must be wrapped to (-π, π].
    pub fn with_residual<R>(mut self, residual: R) -> Self
    where
        R: Fn(&Vector, &Vector) -> Vector + Send + Sync + 'static,
    {
        self.residual = Some(Box::new(residual));
        self
    }

    /// f(x)
    pub fn transition(&self, x: &Vector) -> Vector {
        (self.transition)(x)
    }

    /// F(x)
    pub fn transition_jacobian(&self, x: &Vector) -> Matrix {
        (self.transition_jacobian)(x)
    }

    /// h(x)
    pub fn measure(&self, x: &Vector) -> Vector {
        (self.measurement)(x)
    }

    /// H(x)
    pub fn measurement_jacobian(&self, x: &Vector) -> Matrix {
        (self.measurement_jacobian)(x)
    }

    /// Innovation between an observed and a predicted measurement
    pub fn residual(&self, observed: &Vector, predicted: &Vector) -> Vector {
        match &self.residual {
            Some(residual) => residual(observed, predicted),
            None => observed - predicted,
        }
    }
}

impl fmt::Debug for SystemModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemModel")
            .field("custom_residual", &self.residual.is_some())
            .finish_non_exhaustive()
    }
}
