//! Measurement models
//!
//! Each model maps the state `[x, y, vx, vy]` to the expected noiseless
//! measurement and provides the Jacobian of that map.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{MEAS_DIM, STATE_DIM};

/// Measurement function h(x) with its Jacobian H(x)
pub trait MeasurementModel {
    /// Expected measurement z = h(x)
    fn measure(&self, x: &DVector<f64>) -> DVector<f64>;

    /// H(x), shape `MEAS_DIM x STATE_DIM`
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64>;

    /// Difference between an observed and an expected measurement
    fn residual(&self, observed: &DVector<f64>, expected: &DVector<f64>) -> DVector<f64> {
        observed - expected
    }
}

/// Wrap an angle to [-π, π)
pub fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Direct observation of the position: h(x) = [x, y]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionSensor;

impl MeasurementModel for PositionSensor {
    fn measure(&self, x: &DVector<f64>) -> DVector<f64> {
        x.rows(0, MEAS_DIM).into_owned()
    }

    fn jacobian(&self, _x: &DVector<f64>) -> DMatrix<f64> {
        DMatrix::identity(MEAS_DIM, STATE_DIM)
    }
}

/// Range and bearing from a fixed sensor position
///
/// h(x) = [√(dx² + dy²), atan2(dy, dx)] with (dx, dy) the offset of the
/// target from `origin`. Bearing residuals are wrapped to [-π, π).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeBearingSensor {
    /// Sensor position [m]
    pub origin: [f64; 2],
}

impl RangeBearingSensor {
    pub fn new(origin: [f64; 2]) -> Self {
        Self { origin }
    }

    fn offset(&self, x: &DVector<f64>) -> (f64, f64) {
        (x[0] - self.origin[0], x[1] - self.origin[1])
    }
}

impl MeasurementModel for RangeBearingSensor {
    fn measure(&self, x: &DVector<f64>) -> DVector<f64> {
        let (dx, dy) = self.offset(x);
        DVector::from_vec(vec![dx.hypot(dy), dy.atan2(dx)])
    }

    /// ```text
    /// H = [[ dx/r,   dy/r,  0, 0],
    ///      [-dy/r², dx/r², 0, 0]]
    /// ```
    ///
    /// Zero at the sensor origin, where the bearing is undefined, and for
    /// states too short to hold a position. The shape is always
    /// `MEAS_DIM x STATE_DIM`.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let mut h = DMatrix::zeros(MEAS_DIM, STATE_DIM);
        if x.len() < 2 {
            return h;
        }

        let (dx, dy) = self.offset(x);
        let r2 = dx * dx + dy * dy;
        if r2 < f64::EPSILON {
            return h;
        }

        let r = r2.sqrt();
        h[(0, 0)] = dx / r;
        h[(0, 1)] = dy / r;
        h[(1, 0)] = -dy / r2;
        h[(1, 1)] = dx / r2;
        h
    }

    fn residual(&self, observed: &DVector<f64>, expected: &DVector<f64>) -> DVector<f64> {
        let mut v = observed - expected;
        v[1] = wrap_angle(v[1]);
        v
    }
}
