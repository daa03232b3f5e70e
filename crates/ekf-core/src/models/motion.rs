//! Constant-velocity motion model
//!
//! x_next = [x + vx·dt, y + vy·dt, vx, vy]
//!
//! Velocity is assumed constant between steps; any acceleration is treated
//! as process noise (see [`ConstantVelocity::process_noise`]).

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::STATE_DIM;

/// Constant-velocity motion in the plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantVelocity {
    /// Time step [s]
    pub dt: f64,
}

impl Default for ConstantVelocity {
    fn default() -> Self {
        Self { dt: 1.0 }
    }
}

impl ConstantVelocity {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }

    /// Propagate `[x, y, vx, vy]` by one time step
    pub fn transition(&self, x: &DVector<f64>) -> DVector<f64> {
        &self.transition_matrix() * x
    }

    /// Jacobian of [`Self::transition`]; constant for this model
    pub fn jacobian(&self, _x: &DVector<f64>) -> DMatrix<f64> {
        self.transition_matrix()
    }

    /// F = [[1, 0, dt, 0], [0, 1, 0, dt], [0, 0, 1, 0], [0, 0, 0, 1]]
    pub fn transition_matrix(&self) -> DMatrix<f64> {
        let mut f = DMatrix::identity(STATE_DIM, STATE_DIM);
        f[(0, 2)] = self.dt;
        f[(1, 3)] = self.dt;
        f
    }

    /// Discrete white-noise-acceleration process noise
    ///
    /// For acceleration spectral density `q` on each axis:
    ///
    /// ```text
    /// Q_axis = q · [[dt³/3, dt²/2],
    ///               [dt²/2, dt   ]]
    /// ```
    pub fn process_noise(&self, q: f64) -> DMatrix<f64> {
        let dt = self.dt;
        let (q_pp, q_pv, q_vv) = (q * dt.powi(3) / 3.0, q * dt.powi(2) / 2.0, q * dt);

        let mut m = DMatrix::zeros(STATE_DIM, STATE_DIM);
        for axis in 0..2 {
            let (p, v) = (axis, axis + 2);
            m[(p, p)] = q_pp;
            m[(p, v)] = q_pv;
            m[(v, p)] = q_pv;
            m[(v, v)] = q_vv;
        }
        m
    }
}
