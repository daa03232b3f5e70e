//! Simulation framework
//!
//! Drives the estimator the way a tracking application would: a simulated
//! object, a noisy sensor observing it, and a predict/update loop whose
//! history can be inspected or exported.

pub mod simulator;
pub mod config;
pub mod sensors;

pub use simulator::*;
pub use config::*;
pub use sensors::*;
