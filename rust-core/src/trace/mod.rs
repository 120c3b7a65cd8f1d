//! Sweep data and the sources that produce it

pub mod buffer;
pub mod instrument;
pub mod synthetic;

pub use buffer::{TraceConsumer, TraceProducer, TraceQueue};
pub use instrument::Instrument;
pub use synthetic::{Resonance, SyntheticSweep};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AcquisitionError, PipelineError, TraceError};

/// Rate reported when sweeps complete faster than the clock resolves
pub const INSTANT_SWEEP_RATE: f64 = 1000.0;

/// Sweeps per second for `sweeps` acquisitions taking `elapsed`
pub fn sweep_rate(sweeps: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        sweeps as f64 / secs
    } else {
        INSTANT_SWEEP_RATE
    }
}

/// One complete frequency sweep
///
/// Frequencies are in MHz, magnitudes in dB, phases in degrees. All three
/// sequences share the same length and the frequency grid is strictly
/// increasing. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    frequencies: Vec<f64>,
    magnitudes: Vec<f64>,
    phases: Vec<f64>,
}

impl Trace {
    /// Build a trace, validating lengths, ordering and finiteness
    pub fn new(
        frequencies: Vec<f64>,
        magnitudes: Vec<f64>,
        phases: Vec<f64>,
    ) -> Result<Self, TraceError> {
        if frequencies.len() != magnitudes.len() || frequencies.len() != phases.len() {
            return Err(TraceError::LengthMismatch {
                frequencies: frequencies.len(),
                magnitudes: magnitudes.len(),
                phases: phases.len(),
            });
        }
        if frequencies.is_empty() {
            return Err(TraceError::Empty);
        }

        for i in 0..frequencies.len() {
            if !(frequencies[i].is_finite() && magnitudes[i].is_finite() && phases[i].is_finite()) {
                return Err(TraceError::NonFinite { index: i });
            }
            if i > 0 && frequencies[i] <= frequencies[i - 1] {
                return Err(TraceError::NonIncreasingFrequency { index: i });
            }
        }

        Ok(Self {
            frequencies,
            magnitudes,
            phases,
        })
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    /// Number of samples in the sweep
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Always false for a validated trace; provided for API symmetry
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Reserved "no peak" value: the lowest frequency of the grid
    pub fn sentinel(&self) -> f64 {
        self.frequencies[0]
    }

    /// True if both traces were taken on the same frequency grid
    pub fn same_grid(&self, other: &Trace) -> bool {
        self.check_grid(&other.frequencies).is_ok()
    }

    /// Fail with `GridMismatch` unless this trace was taken on `frequencies`
    pub fn check_grid(&self, frequencies: &[f64]) -> Result<(), PipelineError> {
        let index = if self.len() != frequencies.len() {
            None
        } else {
            match frequencies.iter().zip(&self.frequencies).position(|(a, b)| a != b) {
                Some(i) => Some(i),
                None => return Ok(()),
            }
        };

        Err(PipelineError::GridMismatch {
            expected: frequencies.len(),
            found: self.len(),
            index,
        })
    }
}

/// Anything that can hand out sweeps on demand
///
/// Failures are returned as [`AcquisitionError`] and are never retried by
/// the pipeline; retry policy belongs to the implementor.
pub trait TraceSource {
    fn next_trace(&mut self) -> Result<Trace, AcquisitionError>;
}

impl<S: TraceSource + ?Sized> TraceSource for Box<S> {
    fn next_trace(&mut self) -> Result<Trace, AcquisitionError> {
        (**self).next_trace()
    }
}

/// Linear frequency plan of the instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyPlan {
    /// First frequency of the sweep in MHz
    pub start_freq: f64,

    /// Spacing between sweep points in MHz
    pub freq_step: f64,

    /// Number of sweep points
    pub step_num: usize,
}

impl Default for FrequencyPlan {
    fn default() -> Self {
        Self {
            start_freq: 27.0,
            freq_step: 0.01,
            step_num: 101,
        }
    }
}

impl FrequencyPlan {
    /// Frequency grid in MHz
    pub fn frequencies(&self) -> Vec<f64> {
        (0..self.step_num)
            .map(|i| self.start_freq + i as f64 * self.freq_step)
            .collect()
    }

    /// Last frequency of the sweep in MHz
    pub fn stop_freq(&self) -> f64 {
        self.start_freq + self.step_num.saturating_sub(1) as f64 * self.freq_step
    }

    /// Index of the grid point closest to `freq`
    pub fn nearest_index(&self, freq: f64) -> usize {
        if self.step_num == 0 || self.freq_step <= 0.0 {
            return 0;
        }
        let idx = ((freq - self.start_freq) / self.freq_step).round();
        idx.clamp(0.0, (self.step_num - 1) as f64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_valid() {
        let trace = Trace::new(vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0], vec![0.0; 3]).unwrap();
        assert_eq!(trace.len(), 3);
        assert!(!trace.is_empty());
        assert_eq!(trace.sentinel(), 1.0);
    }

    #[test]
    fn test_trace_length_mismatch() {
        let err = Trace::new(vec![1.0, 2.0], vec![0.0], vec![0.0, 0.0]).unwrap_err();
        assert_eq!(
            err,
            TraceError::LengthMismatch {
                frequencies: 2,
                magnitudes: 1,
                phases: 2
            }
        );
    }

    #[test]
    fn test_trace_empty() {
        assert_eq!(Trace::new(vec![], vec![], vec![]).unwrap_err(), TraceError::Empty);
    }

    #[test]
    fn test_trace_rejects_non_increasing_grid() {
        let err = Trace::new(vec![1.0, 2.0, 2.0], vec![0.0; 3], vec![0.0; 3]).unwrap_err();
        assert_eq!(err, TraceError::NonIncreasingFrequency { index: 2 });
    }

    #[test]
    fn test_trace_rejects_nan() {
        let err = Trace::new(vec![1.0, 2.0], vec![0.0, f64::NAN], vec![0.0; 2]).unwrap_err();
        assert_eq!(err, TraceError::NonFinite { index: 1 });
    }

    #[test]
    fn test_grid_check_catches_shifted_grid() {
        let base = Trace::new(vec![27.0, 27.01, 27.02], vec![0.0; 3], vec![0.0; 3]).unwrap();
        let shifted = Trace::new(vec![30.0, 30.01, 30.02], vec![0.0; 3], vec![0.0; 3]).unwrap();
        let shorter = Trace::new(vec![27.0, 27.01], vec![0.0; 2], vec![0.0; 2]).unwrap();

        assert!(base.same_grid(&base.clone()));
        assert!(!base.same_grid(&shifted));
        assert!(matches!(
            shifted.check_grid(base.frequencies()),
            Err(PipelineError::GridMismatch { expected: 3, found: 3, index: Some(0) })
        ));
        assert!(matches!(
            shorter.check_grid(base.frequencies()),
            Err(PipelineError::GridMismatch { expected: 3, found: 2, index: None })
        ));
    }

    #[test]
    fn test_sweep_rate_fallback() {
        assert_eq!(sweep_rate(10, Duration::ZERO), INSTANT_SWEEP_RATE);
        assert!((sweep_rate(10, Duration::from_millis(500)) - 20.0).abs() < 1e-10);
    }

    #[test]
    fn test_frequency_plan_grid() {
        let plan = FrequencyPlan::default();
        let freqs = plan.frequencies();
        assert_eq!(freqs.len(), 101);
        assert!((freqs[0] - 27.0).abs() < 1e-12);
        assert!((freqs[100] - 28.0).abs() < 1e-9);
        assert!((plan.stop_freq() - 28.0).abs() < 1e-9);
        assert_eq!(plan.nearest_index(27.3), 30);
        assert_eq!(plan.nearest_index(10.0), 0);
        assert_eq!(plan.nearest_index(99.0), 100);
    }
}
