//! Calibration baseline
//!
//! Averages repeated sweeps into a reference baseline (mean and sample
//! standard deviation per grid point) and publishes it atomically.

pub mod shared;

pub use shared::SharedBaseline;

use std::time::Instant;

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::error::PipelineError;
use crate::trace::{sweep_rate, Trace, TraceSource};

/// Minimum number of sweeps for a sample standard deviation
pub const MIN_CALIBRATION_SWEEPS: usize = 2;

/// Reference baseline built from `ave_num` sweeps on one frequency grid
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationBaseline {
    frequencies: Vec<f64>,
    average_magnitudes: Array1<f64>,
    average_phases: Array1<f64>,
    std_magnitudes: Array1<f64>,
    std_phases: Array1<f64>,
    sweeps: usize,
    sampling_rate: f64,
}

/// Sweep expressed relative to a calibration baseline
#[derive(Debug, Clone, PartialEq)]
pub struct RelativeSweep {
    pub frequencies: Vec<f64>,
    /// Magnitude minus baseline average, dB
    pub magnitudes: Vec<f64>,
    /// Phase minus baseline average, degrees
    pub phases: Vec<f64>,
}

impl CalibrationBaseline {
    /// Draw `ave_num` sweeps from `source` and average them
    ///
    /// The stored grid is the one of the last sweep drawn. A sweep taken on
    /// a different grid than its predecessor is rejected with `GridMismatch`.
    /// Acquisition failures abort the run and are returned unchanged.
    pub fn average<S: TraceSource + ?Sized>(
        source: &mut S,
        ave_num: usize,
    ) -> Result<Self, PipelineError> {
        if ave_num < MIN_CALIBRATION_SWEEPS {
            return Err(PipelineError::InsufficientSamples {
                requested: ave_num,
                required: MIN_CALIBRATION_SWEEPS,
            });
        }

        let start = Instant::now();
        let first = source.next_trace()?;
        let n = first.len();
        let mut magnitudes = Array2::<f64>::zeros((ave_num, n));
        let mut phases = Array2::<f64>::zeros((ave_num, n));

        let mut last = first;
        for i in 0..ave_num {
            if i > 0 {
                let next = source.next_trace()?;
                next.check_grid(last.frequencies())?;
                last = next;
            }
            magnitudes.row_mut(i).assign(&ArrayView1::from(last.magnitudes()));
            phases.row_mut(i).assign(&ArrayView1::from(last.phases()));
        }

        let sampling_rate = sweep_rate(ave_num, start.elapsed());
        log::info!("Calibration drew {} sweeps at {:.2} sweeps/s", ave_num, sampling_rate);

        Ok(Self::from_stacked(
            last.frequencies().to_vec(),
            &magnitudes,
            &phases,
            sampling_rate,
        ))
    }

    /// Build a baseline from already collected sweeps (rows = sweeps)
    fn from_stacked(
        frequencies: Vec<f64>,
        magnitudes: &Array2<f64>,
        phases: &Array2<f64>,
        sampling_rate: f64,
    ) -> Self {
        let sweeps = magnitudes.nrows();
        let n = frequencies.len();
        let zeros = || Array1::<f64>::zeros(n);

        Self {
            average_magnitudes: magnitudes.mean_axis(Axis(0)).unwrap_or_else(zeros),
            average_phases: phases.mean_axis(Axis(0)).unwrap_or_else(zeros),
            std_magnitudes: magnitudes.std_axis(Axis(0), 1.0),
            std_phases: phases.std_axis(Axis(0), 1.0),
            frequencies,
            sweeps,
            sampling_rate,
        }
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn average_magnitudes(&self) -> &Array1<f64> {
        &self.average_magnitudes
    }

    pub fn average_phases(&self) -> &Array1<f64> {
        &self.average_phases
    }

    pub fn std_magnitudes(&self) -> &Array1<f64> {
        &self.std_magnitudes
    }

    pub fn std_phases(&self) -> &Array1<f64> {
        &self.std_phases
    }

    /// Number of sweeps the baseline was built from
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Sweeps per second observed while calibrating (advisory only)
    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Express `trace` relative to this baseline
    pub fn relative(&self, trace: &Trace) -> Result<RelativeSweep, PipelineError> {
        trace.check_grid(&self.frequencies)?;

        let magnitudes = (&ArrayView1::from(trace.magnitudes()) - &self.average_magnitudes).to_vec();
        let phases = (&ArrayView1::from(trace.phases()) - &self.average_phases).to_vec();

        Ok(RelativeSweep {
            frequencies: trace.frequencies().to_vec(),
            magnitudes,
            phases,
        })
    }
}
