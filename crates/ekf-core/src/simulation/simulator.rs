//! Main simulation runner
//!
//! Alternates `predict`/`update` on an EKF fed with noisy measurements of a
//! simulated trajectory, and records the resulting `(x, P)` history.

use nalgebra::DVector;
use thiserror::Error;
use tracing::{debug, warn};

use crate::estimation::{EkfState, ExtendedKalmanFilter, FilterError};
use crate::math::symmetry_error;

use super::{ConfigError, NoisySensor, SimConfig, TruthTrajectory};

/// Simulation errors
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),
    #[error("Invalid sensor noise: {0}")]
    SensorNoise(#[from] rand_distr::NormalError),
}

/// Simulation output for one timestep
#[derive(Debug, Clone)]
pub struct SimStep {
    /// Step index, starting at 1
    pub step: usize,
    /// Simulation time [s]
    pub time: f64,
    /// True state `[x, y, vx, vy]`
    pub truth: DVector<f64>,
    /// Noisy measurement fed to the filter
    pub measurement: DVector<f64>,
    /// Filter state after the step
    pub estimate: EkfState,
    /// Normalized innovation squared, `None` if the update was skipped
    pub nis: Option<f64>,
}

impl SimStep {
    /// True if the measurement update was rejected and skipped
    pub fn skipped(&self) -> bool {
        self.nis.is_none()
    }
}

/// Simulation history
#[derive(Debug, Clone, Default)]
pub struct SimHistory {
    pub steps: Vec<SimStep>,
}

impl SimHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a simulation step
    pub fn record(&mut self, step: SimStep) {
        self.steps.push(step);
    }

    /// Get number of recorded steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if history is empty
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimStep> {
        self.steps.iter()
    }

    /// Estimate after the last step
    pub fn final_estimate(&self) -> Option<&EkfState> {
        self.steps.last().map(|s| &s.estimate)
    }

    /// Root-mean-square position error over all steps
    pub fn position_rmse(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self
            .steps
            .iter()
            .map(|s| {
                let dx = s.estimate.x[0] - s.truth[0];
                let dy = s.estimate.x[1] - s.truth[1];
                dx * dx + dy * dy
            })
            .sum();
        (sum_sq / self.steps.len() as f64).sqrt()
    }

    /// Largest asymmetry of P seen during the run
    pub fn max_symmetry_error(&self) -> f64 {
        self.steps
            .iter()
            .map(|s| symmetry_error(&s.estimate.p))
            .fold(0.0, f64::max)
    }

    /// Number of steps whose update was skipped
    pub fn skipped_updates(&self) -> usize {
        self.steps.iter().filter(|s| s.skipped()).count()
    }

    /// Mean NIS over the steps that were updated
    pub fn mean_nis(&self) -> Option<f64> {
        let values: Vec<f64> = self.steps.iter().filter_map(|s| s.nis).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

/// Main simulator
pub struct Simulator {
    /// Configuration
    pub config: SimConfig,
    filter: ExtendedKalmanFilter,
    truth: TruthTrajectory,
    sensor: NoisySensor,
    time: f64,
    step: usize,
    history: SimHistory,
}

impl Simulator {
    /// Create a new simulator from configuration
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let filter = config.build_filter()?;
        let truth = TruthTrajectory::new(&config.truth, config.motion());
        let sensor = NoisySensor::new(&config.sensor, config.seed)?;

        Ok(Self {
            config,
            filter,
            truth,
            sensor,
            time: 0.0,
            step: 0,
            history: SimHistory::new(),
        })
    }

    /// Advance the truth by dt, then predict and update the filter
    ///
    /// A singular innovation covariance skips the update for this step; the
    /// filter keeps its predicted state. Any other filter error aborts.
    pub fn step(&mut self) -> Result<&SimStep, SimError> {
        self.step += 1;
        self.time += self.config.dt;

        let truth = self.truth.advance().clone();
        self.filter.predict()?;

        let measurement = self.sensor.measure(&truth);
        let update = self.filter.update(&measurement).map(|_| ());
        let nis = match update {
            Ok(()) => self.filter.last_innovation().map(|inn| inn.nis),
            Err(FilterError::SingularInnovationCovariance { rcond, .. }) => {
                warn!(step = self.step, rcond, "skipping update: singular innovation covariance");
                None
            }
            Err(e) => return Err(e.into()),
        };

        debug!(
            step = self.step,
            time = self.time,
            x = self.filter.state_estimate()[0],
            y = self.filter.state_estimate()[1],
            nis = ?nis,
            "simulation step"
        );

        self.history.record(SimStep {
            step: self.step,
            time: self.time,
            truth,
            measurement,
            estimate: self.filter.state().clone(),
            nis,
        });

        // record() just pushed, so the history is non-empty
        Ok(&self.history.steps[self.history.len() - 1])
    }

    /// Run the configured number of steps and return the history
    pub fn run(mut self) -> Result<SimHistory, SimError> {
        for _ in 0..self.config.steps {
            self.step()?;
        }
        Ok(self.history)
    }

    pub fn filter(&self) -> &ExtendedKalmanFilter {
        &self.filter
    }

    pub fn truth(&self) -> &TruthTrajectory {
        &self.truth
    }

    pub fn history(&self) -> &SimHistory {
        &self.history
    }

    /// Current simulation time [s]
    pub fn time(&self) -> f64 {
        self.time
    }
}
