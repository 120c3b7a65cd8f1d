//! mRing - Trace Analysis Core
//!
//! Turns network-analyzer sweeps into a calibration baseline, per-frame
//! detrended difference signals, detected peaks and a demo-mode timeline,
//! with optional Python bindings for the host application.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![cfg_attr(feature = "python", allow(non_local_definitions))]

pub mod calibration;
pub mod config;
pub mod demo;
pub mod detection;
pub mod error;
pub mod pipeline;
pub mod timeline;
pub mod trace;

#[cfg(feature = "python")]
pub mod python_bindings;

pub use calibration::{CalibrationBaseline, SharedBaseline};
pub use config::PipelineConfig;
pub use demo::{DemoBand, DemoQuantizer};
pub use detection::{DetectionWindow, PeakDetector};
pub use error::{AcquisitionError, PipelineError, TraceError};
pub use pipeline::{Pipeline, TickOutput};
pub use timeline::TimelineBuffer;
pub use trace::{FrequencyPlan, Trace, TraceSource};
