//! EKF Simulation Driver - Main Entry Point

use std::fs::File;
use std::io::{self, BufWriter};

use anyhow::Context;
use clap::Parser;
use ekf_core::simulation::Simulator;
use ekf_sim::{Cli, CsvWriter};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.load_config().context("failed to load scenario")?;
    info!(
        steps = config.steps,
        dt = config.dt,
        seed = config.seed,
        sensor = ?config.sensor.model,
        "Starting simulation"
    );

    let history = Simulator::new(config)?.run()?;

    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            CsvWriter::new(BufWriter::new(file)).write_history(&history)?;
            info!("Wrote {} rows to {}", history.len(), path.display());
        }
        None => {
            let stdout = io::stdout();
            CsvWriter::new(stdout.lock()).write_history(&history)?;
        }
    }

    if let Some(last) = history.final_estimate() {
        info!(
            x = last.x[0],
            y = last.x[1],
            vx = last.x[2],
            vy = last.x[3],
            "Final estimate"
        );
    }
    info!(
        position_rmse = history.position_rmse(),
        mean_nis = ?history.mean_nis(),
        skipped_updates = history.skipped_updates(),
        max_symmetry_error = history.max_symmetry_error(),
        "Simulation finished"
    );

    Ok(())
}

/// Initialize logging subsystem
///
/// Logs go to stderr so that CSV on stdout stays clean.
fn init_logging(verbose: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    if verbose {
        subscriber.with_max_level(tracing::Level::DEBUG).init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber.with_max_level(tracing::Level::INFO).init();
    }
}
