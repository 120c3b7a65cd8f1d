//! Error taxonomy for the trace analysis pipeline
//!
//! Acquisition failures are propagated unchanged from the trace source.
//! Fit and sample-count errors are configuration errors and are normally
//! raised once, at start-up validation.

use thiserror::Error;

use crate::config::ConfigError;
use crate::detection::DetectionWindow;

/// Invalid trace contents, detected at construction time
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraceError {
    #[error("Trace must contain at least one sample")]
    Empty,

    #[error("Trace component lengths differ (frequencies: {frequencies}, magnitudes: {magnitudes}, phases: {phases})")]
    LengthMismatch {
        frequencies: usize,
        magnitudes: usize,
        phases: usize,
    },

    #[error("Frequencies must be strictly increasing (violated at index {index})")]
    NonIncreasingFrequency { index: usize },

    #[error("Non-finite sample at index {index}")]
    NonFinite { index: usize },
}

/// Failure reported by a trace source
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("No trace available from source")]
    NoData,

    #[error("Instrument error: {0}")]
    Instrument(String),

    #[error("Instrument returned an invalid trace: {0}")]
    InvalidTrace(#[from] TraceError),
}

/// Top-level pipeline error
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Polynomial fit of degree {degree} is underdetermined over window {window} ({samples} samples, threshold {threshold} dB)")]
    DegenerateFit {
        window: DetectionWindow,
        degree: usize,
        threshold: f64,
        samples: usize,
    },

    #[error("Detection window {window} exceeds trace of {trace_len} samples (degree {degree}, threshold {threshold} dB)")]
    WindowOutOfRange {
        window: DetectionWindow,
        trace_len: usize,
        degree: usize,
        threshold: f64,
    },

    #[error("Calibration needs at least {required} sweeps, got {requested}")]
    InsufficientSamples { requested: usize, required: usize },

    /// `index` is the first differing point when both grids have the same length
    #[error("Frequency grid mismatch (expected {expected} samples, found {found}{})", differing_point(.index))]
    GridMismatch {
        expected: usize,
        found: usize,
        index: Option<usize>,
    },

    #[error("Calibration expects exactly {expected} sweeps, got {found}")]
    SweepCount { expected: usize, found: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

fn differing_point(index: &Option<usize>) -> String {
    index.map_or_else(String::new, |i| format!(", first difference at index {}", i))
}
