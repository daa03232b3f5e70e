//! State estimation
//!
//! - EKF (Extended Kalman Filter) with caller-supplied models and Jacobians
//! - Linear Kalman filter, the special case with constant models

pub mod error;
pub mod model;
pub mod ekf;
pub mod linear;

pub use error::*;
pub use model::*;
pub use ekf::*;
pub use linear::*;
