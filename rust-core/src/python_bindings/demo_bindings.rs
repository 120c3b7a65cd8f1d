//! Python bindings for demo-mode quantization

use pyo3::prelude::*;

use crate::demo::{self, DemoBand};

/// Quantize a peak frequency onto demo bands
///
/// Args:
///     peak_freq: Detected peak frequency in MHz
///     enabled: Whether demo mode is on
///     bands: List of (min_freq, max_freq, target_freq) tuples
///     sentinel: "No peak" value (first frequency of the sweep)
///
/// Returns:
///     Target frequency of the first matching band, the sentinel, or
///     peak_freq unchanged when demo mode is off
#[pyfunction]
pub fn quantize(peak_freq: f64, enabled: bool, bands: Vec<(f64, f64, f64)>, sentinel: f64) -> f64 {
    let bands: Vec<DemoBand> = bands
        .into_iter()
        .map(|(min_freq, max_freq, target_freq)| DemoBand::new(min_freq, max_freq, target_freq))
        .collect();
    demo::quantize(peak_freq, enabled, &bands, sentinel)
}
