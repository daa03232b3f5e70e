//! CSV output of a simulation history
//!
//! One row per step: truth, measurement, estimate, covariance diagonal and
//! NIS. Skipped updates leave the `nis` column empty.

use std::io::{self, Write};

use ekf_core::simulation::{SimHistory, SimStep};

/// Column header, in row order
pub const CSV_HEADER: &str =
    "step,time,true_x,true_y,meas_0,meas_1,x,y,vx,vy,p_xx,p_yy,p_vxvx,p_vyvy,nis";

/// Writes simulation steps as CSV rows
pub struct CsvWriter<W: Write> {
    out: W,
    header_written: bool,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }

    /// Write one step, preceded by the header on first use
    pub fn write_step(&mut self, step: &SimStep) -> io::Result<()> {
        if !self.header_written {
            writeln!(self.out, "{}", CSV_HEADER)?;
            self.header_written = true;
        }

        let x = &step.estimate.x;
        let p = &step.estimate.p;
        let nis = step.nis.map(|v| v.to_string()).unwrap_or_default();

        writeln!(
            self.out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            step.step,
            step.time,
            step.truth[0],
            step.truth[1],
            step.measurement[0],
            step.measurement[1],
            x[0],
            x[1],
            x[2],
            x[3],
            p[(0, 0)],
            p[(1, 1)],
            p[(2, 2)],
            p[(3, 3)],
            nis,
        )
    }

    /// Write every step of a history
    pub fn write_history(&mut self, history: &SimHistory) -> io::Result<()> {
        for step in history.iter() {
            self.write_step(step)?;
        }
        self.out.flush()
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }
}
