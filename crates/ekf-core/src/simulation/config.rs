//! Simulation configuration
//!
//! Defines configuration structures for setting up tracking scenarios.
//! The defaults describe an object starting at the origin and moving with
//! velocity [1, 1], observed by a position sensor, tracked for 50 steps.

use std::fs;
use std::path::Path;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::estimation::{EkfOptions, ExtendedKalmanFilter, FilterError, SystemModel};
use crate::models::{
    planar_model, ConstantVelocity, MeasurementModel, PositionSensor, RangeBearingSensor,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of predict/update cycles
    pub steps: usize,
    /// Time step [s]
    pub dt: f64,
    /// Seed for the measurement noise generator
    pub seed: u64,
    /// Ground truth motion
    pub truth: TruthConfig,
    /// Filter initialisation and noise
    pub filter: FilterConfig,
    /// Sensor configuration
    pub sensor: SensorConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            steps: 50,
            dt: 1.0,
            seed: 42,
            truth: TruthConfig::default(),
            filter: FilterConfig::default(),
            sensor: SensorConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string; missing fields take defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        let q = self.filter.process_noise_intensity;
        if !q.is_finite() || q < 0.0 {
            return Err(ConfigError::Validation(
                "filter.process_noise_intensity must be non-negative".into(),
            ));
        }
        if self.filter.initial_covariance_diag.iter().any(|&v| !v.is_finite() || v < 0.0) {
            return Err(ConfigError::Validation(
                "filter.initial_covariance_diag entries must be non-negative and finite".into(),
            ));
        }
        if self.sensor.noise_std.iter().any(|&v| !v.is_finite() || v < 0.0) {
            return Err(ConfigError::Validation(
                "sensor.noise_std entries must be non-negative and finite".into(),
            ));
        }
        self.filter
            .options
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        Ok(())
    }

    /// Motion model shared by the ground truth and the filter
    pub fn motion(&self) -> ConstantVelocity {
        ConstantVelocity::new(self.dt)
    }

    /// Build the EKF described by this configuration
    ///
    /// R is matched to the sensor noise: diag(noise_std²).
    pub fn build_filter(&self) -> Result<ExtendedKalmanFilter, FilterError> {
        let motion = self.motion();
        let x0 = DVector::from_column_slice(&self.filter.initial_state);
        let p0 = DMatrix::from_diagonal(&DVector::from_column_slice(
            &self.filter.initial_covariance_diag,
        ));
        let q = motion.process_noise(self.filter.process_noise_intensity);
        let r = DMatrix::from_diagonal(&DVector::from_iterator(
            2,
            self.sensor.noise_std.iter().map(|s| s * s),
        ));

        let options = EkfOptions {
            dt: self.dt,
            ..self.filter.options.clone()
        };

        ExtendedKalmanFilter::new(x0, p0, q, r, self.sensor.model.system_model(motion))?
            .with_options(options)
    }
}

/// Ground truth initial conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruthConfig {
    /// Initial position [m]
    pub position: [f64; 2],
    /// Constant velocity [m/s]
    pub velocity: [f64; 2],
}

impl Default for TruthConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0],
            velocity: [1.0, 1.0],
        }
    }
}

impl TruthConfig {
    /// Initial truth state `[x, y, vx, vy]`
    pub fn initial_state(&self) -> DVector<f64> {
        DVector::from_vec(vec![
            self.position[0],
            self.position[1],
            self.velocity[0],
            self.velocity[1],
        ])
    }
}

/// Filter initialisation and process noise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Initial estimate `[x, y, vx, vy]`
    pub initial_state: [f64; 4],
    /// Initial covariance diagonal
    pub initial_covariance_diag: [f64; 4],
    /// Acceleration spectral density of the constant-velocity model
    pub process_noise_intensity: f64,
    /// Estimator options (dt is taken from the scenario)
    pub options: EkfOptions,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            initial_state: [0.0; 4],
            initial_covariance_diag: [10.0; 4],
            process_noise_intensity: 1e-4,
            options: EkfOptions::default(),
        }
    }
}

/// Sensor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// What the sensor observes
    pub model: SensorKind,
    /// Noise standard deviation per measurement component
    pub noise_std: [f64; 2],
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            model: SensorKind::Position,
            noise_std: [0.5, 0.5],
        }
    }
}

/// Measurement model selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorKind {
    /// h(x) = [x, y]
    #[default]
    Position,
    /// h(x) = [range, bearing] from `origin`
    RangeBearing { origin: [f64; 2] },
}

impl SensorKind {
    /// EKF model for this sensor combined with `motion`
    pub fn system_model(&self, motion: ConstantVelocity) -> SystemModel {
        match *self {
            SensorKind::Position => planar_model(motion, PositionSensor),
            SensorKind::RangeBearing { origin } => {
                planar_model(motion, RangeBearingSensor::new(origin))
            }
        }
    }

    /// Noiseless measurement of a state
    pub fn measure(&self, x: &DVector<f64>) -> DVector<f64> {
        match *self {
            SensorKind::Position => PositionSensor.measure(x),
            SensorKind::RangeBearing { origin } => RangeBearingSensor::new(origin).measure(x),
        }
    }
}
