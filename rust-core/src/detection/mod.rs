//! Per-frame peak detection
//!
//! Detrends the magnitude of a sweep with a least-squares polynomial,
//! smooths the residual and extracts one peak per run above threshold.
//! Detection works on the frame alone; the calibration baseline is not used.

pub mod peaks;
pub mod polyfit;
pub mod smoothing;

pub use peaks::find_peaks;
pub use polyfit::PolynomialFit;
pub use smoothing::MovingAverage;

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::trace::Trace;

/// Residue of an exact fit, relative to the magnitude scale, below which a
/// difference does not count as positive
const FIT_RESIDUE: f64 = 1e-9;

/// Contiguous index range `[lo, hi)` of a sweep used for detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionWindow {
    pub lo: usize,
    pub hi: usize,
}

impl DetectionWindow {
    pub fn new(lo: usize, hi: usize) -> Self {
        Self { lo, hi }
    }

    /// Window over `len` samples excluding edge guards on both sides
    pub fn with_guards(len: usize, guard_low: usize, guard_high: usize) -> Self {
        let hi = len.saturating_sub(guard_high);
        Self {
            lo: guard_low.min(hi),
            hi,
        }
    }

    pub fn len(&self) -> usize {
        self.hi.saturating_sub(self.lo)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.lo..self.hi.max(self.lo)
    }

    /// True if the window lies inside a sweep of `len` samples
    pub fn fits(&self, len: usize) -> bool {
        self.lo <= self.hi && self.hi <= len
    }
}

impl fmt::Display for DetectionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lo, self.hi)
    }
}

/// Result of detecting peaks in one frame
///
/// All vectors are indexed relative to `window`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub window: DetectionWindow,
    /// Window-relative peak indices, ascending
    pub peaks: Vec<usize>,
    pub baseline_fit: Vec<f64>,
    pub raw_diff: Vec<f64>,
    pub filtered_diff: Vec<f64>,
}

impl Detection {
    /// Grid index of a window-relative peak index
    pub fn absolute_index(&self, peak: usize) -> usize {
        self.window.lo + peak
    }

    /// Lowest-frequency peak, used as "the" peak of the frame
    pub fn primary_peak(&self) -> Option<usize> {
        self.peaks.first().copied()
    }

    pub fn has_peaks(&self) -> bool {
        !self.peaks.is_empty()
    }
}

/// Detect peaks in `trace` over `window`
///
/// # Arguments
/// * `trace` - Sweep to analyze
/// * `window` - Index range of the sweep to use
/// * `degree` - Degree of the detrending polynomial
/// * `threshold` - Minimum smoothed difference above the fit, dB
/// * `smoothing` - Moving-average width applied to the raw difference
///
/// # Returns
/// Peaks and intermediate signals; an empty peak list means "no peak"
pub fn detect(
    trace: &Trace,
    window: DetectionWindow,
    degree: usize,
    threshold: f64,
    smoothing: usize,
) -> Result<Detection, PipelineError> {
    PeakDetector::new(window, degree, threshold, smoothing)?.detect(trace)
}

/// Peak detector with fixed window, degree, threshold and smoothing
#[derive(Debug, Clone, PartialEq)]
pub struct PeakDetector {
    window: DetectionWindow,
    degree: usize,
    threshold: f64,
    smoothing: MovingAverage,
}

impl PeakDetector {
    /// Create a detector, failing fast on an underdetermined fit
    pub fn new(
        window: DetectionWindow,
        degree: usize,
        threshold: f64,
        smoothing: usize,
    ) -> Result<Self, PipelineError> {
        if window.len() < degree + 1 {
            return Err(PipelineError::DegenerateFit {
                window,
                degree,
                threshold,
                samples: window.len(),
            });
        }

        Ok(Self {
            window,
            degree,
            threshold,
            smoothing: MovingAverage::new(smoothing),
        })
    }

    pub fn window(&self) -> DetectionWindow {
        self.window
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn smoothing(&self) -> usize {
        self.smoothing.width()
    }

    /// Run detection on one frame
    pub fn detect(&self, trace: &Trace) -> Result<Detection, PipelineError> {
        if !self.window.fits(trace.len()) {
            return Err(PipelineError::WindowOutOfRange {
                window: self.window,
                trace_len: trace.len(),
                degree: self.degree,
                threshold: self.threshold,
            });
        }

        let magnitudes = &trace.magnitudes()[self.window.range()];
        let fit = PolynomialFit::fit(magnitudes, self.degree).ok_or(PipelineError::DegenerateFit {
            window: self.window,
            degree: self.degree,
            threshold: self.threshold,
            samples: magnitudes.len(),
        })?;

        let baseline_fit = fit.evaluate();
        let raw_diff: Vec<f64> = magnitudes
            .iter()
            .zip(&baseline_fit)
            .map(|(m, b)| m - b)
            .collect();
        let filtered_diff = self.smoothing.apply(&raw_diff);

        let scale = magnitudes.iter().fold(1.0f64, |s, m| s.max(m.abs()));
        let peaks = find_peaks(&filtered_diff, self.threshold, FIT_RESIDUE * scale);

        log::debug!(
            "Detected {} peak(s) in window {} (degree {}, threshold {} dB)",
            peaks.len(),
            self.window,
            self.degree,
            self.threshold
        );

        Ok(Detection {
            window: self.window,
            peaks,
            baseline_fit,
            raw_diff,
            filtered_diff,
        })
    }
}
