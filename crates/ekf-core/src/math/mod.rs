//! Mathematical utilities
//!
//! Covariance checks and updates shared by the estimators.

pub mod covariance;

pub use covariance::*;
