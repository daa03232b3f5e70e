//! # EKF Core
//!
//! Extended Kalman Filter for tracking a moving object in the plane.
//!
//! The estimator keeps a mean state `[x, y, vx, vy]` and its covariance,
//! propagates them through a (possibly nonlinear) motion model and corrects
//! them against (possibly nonlinear) measurements, linearising both models
//! with caller-supplied Jacobians.
//!
//! ## Modules
//!
//! - [`estimation`]: EKF estimator, linear Kalman filter, callback bundle, errors
//! - [`models`]: Planar motion and measurement models
//! - [`math`]: Covariance helpers
//! - [`simulation`]: Ground truth, noisy sensors and the predict/update driver

pub mod math;
pub mod models;
pub mod estimation;
pub mod simulation;

// Common type aliases
use nalgebra::{DMatrix, DVector};

/// Dynamically sized state / measurement vector
pub type Vector = DVector<f64>;

/// Dynamically sized matrix
pub type Matrix = DMatrix<f64>;

/// State dimension of the planar position/velocity model: `[x, y, vx, vy]`
pub const STATE_DIM: usize = 4;

/// Measurement dimension of the planar position sensor: `[x, y]`
pub const MEAS_DIM: usize = 2;

pub use estimation::{
    CovarianceUpdate, EkfOptions, EkfState, ExtendedKalmanFilter, FilterDimensions, FilterError,
    Innovation, LinearKalmanFilter, SystemModel,
};
