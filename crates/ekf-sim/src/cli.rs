//! Command-line configuration

use std::path::PathBuf;

use clap::Parser;
use ekf_core::estimation::CovarianceUpdate;
use ekf_core::simulation::{ConfigError, SimConfig};

/// Run a simulated EKF tracking scenario and write the estimated trajectory as CSV
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Scenario file (TOML). Built-in defaults are used when omitted.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the number of predict/update cycles
    #[arg(long, value_name = "N")]
    pub steps: Option<usize>,

    /// Override the measurement noise seed
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Override the time step [s]
    #[arg(long, value_name = "SECONDS")]
    pub dt: Option<f64>,

    /// Use the Joseph-form covariance update
    #[arg(long, default_value_t = false)]
    pub joseph: bool,

    /// Write CSV to this file instead of stdout
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Load the scenario and apply command-line overrides
    pub fn load_config(&self) -> Result<SimConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => SimConfig::from_file(path)?,
            None => SimConfig::default(),
        };

        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(dt) = self.dt {
            config.dt = dt;
        }
        if self.joseph {
            config.filter.options.covariance_update = CovarianceUpdate::Joseph;
        }

        config.validate()?;
        Ok(config)
    }
}
