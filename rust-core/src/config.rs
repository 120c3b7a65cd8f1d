//! Session configuration
//!
//! Read once at start-up from a TOML file and validated before the first
//! tick. Every section has defaults matching the reference setup, so a file
//! only needs to list what it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calibration::MIN_CALIBRATION_SWEEPS;
use crate::demo::{DemoBand, DemoQuantizer};
use crate::detection::{DetectionWindow, PeakDetector};
use crate::error::PipelineError;
use crate::timeline::DEFAULT_TIMELINE_CAPACITY;
use crate::trace::FrequencyPlan;

/// File looked up in the working directory and its ancestors
pub const CONFIG_FILE_NAME: &str = "mring.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Demo band {index} has min_freq above max_freq")]
    InvertedBand { index: usize },

    #[error("Demo bands {first} and {second} overlap")]
    OverlappingBands { first: usize, second: usize },
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sweep: FrequencyPlan,
    pub detection: DetectionConfig,
    pub calibration: CalibrationConfig,
    pub demo: DemoConfig,
    pub timeline: TimelineConfig,
}

/// Peak detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Samples excluded at the low end of the sweep
    pub guard_low: usize,
    /// Samples excluded at the high end of the sweep
    pub guard_high: usize,
    /// Degree of the detrending polynomial
    pub degree: usize,
    /// Minimum smoothed difference above the fit, dB
    pub threshold: f64,
    /// Moving-average width
    pub smoothing: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            guard_low: 5,
            guard_high: 5,
            degree: 2,
            threshold: 0.5,
            smoothing: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Sweeps averaged per calibration
    pub ave_num: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { ave_num: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub enabled: bool,
    /// `[min_freq, max_freq, target_freq]` triples, first match wins
    pub bands: Vec<DemoBand>,
    /// Accept overlapping bands instead of rejecting the configuration
    pub allow_overlap: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub capacity: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_TIMELINE_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Load from `path`, or from the first `mring.toml` found walking up
    /// from the working directory
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let paths: Vec<PathBuf> = match path {
            Some(p) => vec![p.into()],
            None => std::env::current_dir()?
                .ancestors()
                .map(|dir| dir.join(CONFIG_FILE_NAME))
                .collect(),
        };

        let mut last_error = None;
        for path in paths {
            match std::fs::read_to_string(&path) {
                Ok(contents) => {
                    let config = Self::from_toml_str(&contents)?;
                    log::info!("Loaded configuration from {:?}", path);
                    return Ok(config);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error
            .map(ConfigError::from)
            .unwrap_or_else(|| ConfigError::Invalid("no configuration file found".into())))
    }

    /// Load the nearest `mring.toml`, or the built-in defaults when there is
    /// none; a file that exists but fails to read or parse is an error
    pub fn discover() -> Result<Self, ConfigError> {
        Self::default_if_missing(Self::load(None))
    }

    fn default_if_missing(loaded: Result<Self, ConfigError>) -> Result<Self, ConfigError> {
        match loaded {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No {} found, using built-in configuration", CONFIG_FILE_NAME);
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Detection window over the configured sweep
    pub fn detection_window(&self) -> DetectionWindow {
        DetectionWindow::with_guards(
            self.sweep.step_num,
            self.detection.guard_low,
            self.detection.guard_high,
        )
    }

    pub fn peak_detector(&self) -> Result<PeakDetector, PipelineError> {
        PeakDetector::new(
            self.detection_window(),
            self.detection.degree,
            self.detection.threshold,
            self.detection.smoothing,
        )
    }

    pub fn demo_quantizer(&self) -> DemoQuantizer {
        DemoQuantizer::new(self.demo.enabled, self.demo.bands.clone())
    }

    /// Start-up validation; every check here would otherwise fail per tick
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.sweep.step_num == 0 {
            return Err(ConfigError::Invalid("sweep.step_num must be at least 1".into()).into());
        }
        if !(self.sweep.freq_step > 0.0) {
            return Err(ConfigError::Invalid("sweep.freq_step must be positive".into()).into());
        }
        if self.detection.smoothing == 0 {
            return Err(ConfigError::Invalid("detection.smoothing must be at least 1".into()).into());
        }
        if !self.detection.threshold.is_finite() {
            return Err(ConfigError::Invalid("detection.threshold must be finite".into()).into());
        }
        if self.timeline.capacity == 0 {
            return Err(ConfigError::Invalid("timeline.capacity must be at least 1".into()).into());
        }
        if self.calibration.ave_num < MIN_CALIBRATION_SWEEPS {
            return Err(PipelineError::InsufficientSamples {
                requested: self.calibration.ave_num,
                required: MIN_CALIBRATION_SWEEPS,
            });
        }

        self.peak_detector()?;

        if let Some(index) = self
            .demo
            .bands
            .iter()
            .position(|band| band.min_freq > band.max_freq)
        {
            return Err(ConfigError::InvertedBand { index }.into());
        }
        if !self.demo.allow_overlap {
            if let Some((first, second)) = self.demo_quantizer().first_overlap() {
                return Err(ConfigError::OverlappingBands { first, second }.into());
            }
        }

        Ok(())
    }
}
