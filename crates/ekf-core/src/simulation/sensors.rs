//! Sensor and ground-truth models for simulation
//!
//! Provides the true constant-velocity trajectory and noisy measurements of
//! it for driving the filter.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, NormalError};

use super::{SensorConfig, SensorKind, TruthConfig};
use crate::models::ConstantVelocity;

/// Ground-truth trajectory of the tracked object
#[derive(Debug, Clone)]
pub struct TruthTrajectory {
    motion: ConstantVelocity,
    state: DVector<f64>,
}

impl TruthTrajectory {
    pub fn new(config: &TruthConfig, motion: ConstantVelocity) -> Self {
        Self {
            motion,
            state: config.initial_state(),
        }
    }

    /// Advance by one time step
    pub fn advance(&mut self) -> &DVector<f64> {
        self.state = self.motion.transition(&self.state);
        &self.state
    }

    /// True state `[x, y, vx, vy]`
    pub fn state(&self) -> &DVector<f64> {
        &self.state
    }
}

/// Sensor adding zero-mean Gaussian noise to the ideal measurement
#[derive(Debug, Clone)]
pub struct NoisySensor {
    kind: SensorKind,
    noise: [Normal<f64>; 2],
    rng: StdRng,
}

impl NoisySensor {
    /// Create a sensor with a seeded noise generator
    pub fn new(config: &SensorConfig, seed: u64) -> Result<Self, NormalError> {
        Ok(Self {
            kind: config.model,
            noise: [
                Normal::new(0.0, config.noise_std[0])?,
                Normal::new(0.0, config.noise_std[1])?,
            ],
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Get noisy measurement of a true state
    pub fn measure(&mut self, true_state: &DVector<f64>) -> DVector<f64> {
        let mut z = self.kind.measure(true_state);
        for (i, noise) in self.noise.iter().enumerate() {
            z[i] += noise.sample(&mut self.rng);
        }
        z
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }
}
