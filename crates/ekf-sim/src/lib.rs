//! EKF Simulation Driver
//!
//! Command-line front end for running tracking scenarios with
//! [`ekf_core`]: argument parsing, scenario loading and CSV export of the
//! estimated trajectory.
//!
//! - [`cli`]: Command-line arguments and scenario overrides
//! - [`output`]: CSV history writer

pub mod cli;
pub mod output;

pub use cli::Cli;
pub use output::CsvWriter;
