//! Demo-mode quantization
//!
//! Snaps a continuously varying peak frequency onto a small set of target
//! frequencies so that demo visualizations and their state machines see a
//! stable, discrete value.

use serde::{Deserialize, Serialize};

/// Distance from the sentinel (MHz) under which a value counts as "no peak"
pub const SENTINEL_TOLERANCE: f64 = 0.001;

/// Frequency band `[min_freq, max_freq]` mapped onto `target_freq`
///
/// Serialized as a `[min, max, target]` triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct DemoBand {
    pub min_freq: f64,
    pub max_freq: f64,
    pub target_freq: f64,
}

impl DemoBand {
    pub fn new(min_freq: f64, max_freq: f64, target_freq: f64) -> Self {
        Self {
            min_freq,
            max_freq,
            target_freq,
        }
    }

    /// Inclusive on both ends
    pub fn contains(&self, freq: f64) -> bool {
        self.min_freq <= freq && freq <= self.max_freq
    }

    pub fn overlaps(&self, other: &DemoBand) -> bool {
        self.min_freq <= other.max_freq && other.min_freq <= self.max_freq
    }
}

impl From<[f64; 3]> for DemoBand {
    fn from([min_freq, max_freq, target_freq]: [f64; 3]) -> Self {
        Self::new(min_freq, max_freq, target_freq)
    }
}

impl From<DemoBand> for [f64; 3] {
    fn from(band: DemoBand) -> Self {
        [band.min_freq, band.max_freq, band.target_freq]
    }
}

/// Map `peak_freq` onto the configured bands
///
/// * disabled or no bands: `peak_freq` unchanged
/// * within [`SENTINEL_TOLERANCE`] of `sentinel`: `sentinel`
/// * inside a band: that band's target (first match in list order)
/// * otherwise: `sentinel`
pub fn quantize(peak_freq: f64, enabled: bool, bands: &[DemoBand], sentinel: f64) -> f64 {
    if !enabled || bands.is_empty() {
        return peak_freq;
    }

    if (peak_freq - sentinel).abs() < SENTINEL_TOLERANCE {
        return sentinel;
    }

    bands
        .iter()
        .find(|band| band.contains(peak_freq))
        .map_or(sentinel, |band| band.target_freq)
}

/// Demo-mode configuration bound to a band list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DemoQuantizer {
    enabled: bool,
    bands: Vec<DemoBand>,
}

impl DemoQuantizer {
    pub fn new(enabled: bool, bands: Vec<DemoBand>) -> Self {
        Self { enabled, bands }
    }

    /// Quantizer that passes every value through
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn bands(&self) -> &[DemoBand] {
        &self.bands
    }

    pub fn quantize(&self, peak_freq: f64, sentinel: f64) -> f64 {
        quantize(peak_freq, self.enabled, &self.bands, sentinel)
    }

    /// Position of the band whose target equals a quantized value
    ///
    /// `None` for the sentinel, for pass-through values, or when demo mode is
    /// off.
    pub fn band_index(&self, quantized: f64) -> Option<usize> {
        if !self.enabled {
            return None;
        }
        self.bands
            .iter()
            .position(|band| (band.target_freq - quantized).abs() < SENTINEL_TOLERANCE)
    }

    /// Every value `quantize` can return while enabled with bands configured
    pub fn output_domain(&self, sentinel: f64) -> Vec<f64> {
        std::iter::once(sentinel)
            .chain(self.bands.iter().map(|band| band.target_freq))
            .collect()
    }

    /// First pair of overlapping bands, by list position
    pub fn first_overlap(&self) -> Option<(usize, usize)> {
        for (i, a) in self.bands.iter().enumerate() {
            for (j, b) in self.bands.iter().enumerate().skip(i + 1) {
                if a.overlaps(b) {
                    return Some((i, j));
                }
            }
        }
        None
    }
}
