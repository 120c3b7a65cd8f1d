//! Python bindings for the per-tick pipeline

use std::path::Path;

use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use super::to_py_err;
use crate::config::PipelineConfig;
use crate::pipeline::Pipeline;
use crate::trace::Trace;

fn read_array(array: &PyReadonlyArray1<f64>) -> PyResult<Vec<f64>> {
    array
        .as_slice()
        .map(|s| s.to_vec())
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()))
}

fn build_trace(freq: Vec<f64>, mag: Vec<f64>, phase: Vec<f64>) -> PyResult<Trace> {
    Trace::new(freq, mag, phase)
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()))
}

/// Trace analysis pipeline exposed to Python
#[pyclass(name = "Pipeline", unsendable)]
pub struct PyPipeline {
    pipeline: Pipeline,
}

#[pymethods]
impl PyPipeline {
    /// Create a pipeline
    ///
    /// Args:
    ///     config_path: TOML configuration file (default: built-in reference setup)
    #[new]
    #[pyo3(signature = (config_path=None))]
    fn new(config_path: Option<String>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => PipelineConfig::load(Some(Path::new(&path)))
                .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()))?,
            None => PipelineConfig::default(),
        };

        Ok(Self {
            pipeline: Pipeline::new(config).map_err(to_py_err)?,
        })
    }

    /// Run one tick on a sweep
    ///
    /// Args:
    ///     freq: Frequencies in MHz
    ///     mag: Magnitudes in dB
    ///     phase: Phases in degrees
    ///     sampling_rate: Sweeps per second reported by the instrument
    ///
    /// Returns:
    ///     Dictionary with keys: 'freq', 'raw_db', 'base_db', 'diff_db',
    ///     'filtered_diff_db', 'peaks', 'fps', 'target_ids', 'threshold',
    ///     'peak', 'quantized', 'active_band', 'timeline_x', 'timeline_y',
    ///     'timeline_latest'
    #[pyo3(signature = (freq, mag, phase, sampling_rate=0.0))]
    fn process<'py>(
        &mut self,
        py: Python<'py>,
        freq: PyReadonlyArray1<f64>,
        mag: PyReadonlyArray1<f64>,
        phase: PyReadonlyArray1<f64>,
        sampling_rate: f64,
    ) -> PyResult<&'py PyDict> {
        let trace = build_trace(read_array(&freq)?, read_array(&mag)?, read_array(&phase)?)?;
        let out = self.pipeline.process(&trace, sampling_rate).map_err(to_py_err)?;

        let dict = PyDict::new(py);
        let frame = out.frame;
        let peaks: Vec<i64> = frame.peaks.iter().map(|&p| p as i64).collect();
        let target_ids: Vec<i64> = frame.window_indices.iter().map(|&i| i as i64).collect();
        dict.set_item("freq", PyArray1::from_vec(py, frame.frequencies))?;
        dict.set_item("raw_db", PyArray1::from_vec(py, frame.raw_magnitudes))?;
        dict.set_item("base_db", PyArray1::from_vec(py, frame.baseline_fit))?;
        dict.set_item("diff_db", PyArray1::from_vec(py, frame.raw_diff))?;
        dict.set_item("filtered_diff_db", PyArray1::from_vec(py, frame.filtered_diff))?;
        dict.set_item("peaks", PyArray1::from_vec(py, peaks))?;
        dict.set_item("fps", frame.sampling_rate)?;
        dict.set_item("target_ids", PyArray1::from_vec(py, target_ids))?;
        dict.set_item("threshold", frame.threshold)?;
        dict.set_item("peak", out.peak)?;
        dict.set_item("quantized", out.quantized)?;
        dict.set_item("active_band", out.active_band)?;
        dict.set_item("timeline_x", PyArray1::from_vec(py, out.timeline.positions))?;
        dict.set_item("timeline_y", PyArray1::from_vec(py, out.timeline.values))?;
        dict.set_item("timeline_latest", out.timeline.latest_index)?;

        Ok(dict)
    }

    /// Average recorded sweeps into a new calibration baseline
    ///
    /// Args:
    ///     sweeps: List of exactly `ave_num` (freq, mag, phase) sequences
    ///
    /// Returns:
    ///     Sweeps per second observed while calibrating
    fn calibrate(&mut self, sweeps: Vec<(Vec<f64>, Vec<f64>, Vec<f64>)>) -> PyResult<f64> {
        let traces = sweeps
            .into_iter()
            .map(|(freq, mag, phase)| build_trace(freq, mag, phase))
            .collect::<PyResult<Vec<_>>>()?;

        let baseline = self.pipeline.calibrate_recorded(traces).map_err(to_py_err)?;
        Ok(baseline.sampling_rate())
    }

    /// Latest calibration baseline
    ///
    /// Returns:
    ///     Dictionary with keys: 'freq', 'ave_db', 'ave_phase', 'std_db',
    ///     'std_phase', or None before the first calibration
    fn baseline<'py>(&self, py: Python<'py>) -> PyResult<Option<&'py PyDict>> {
        let Some(baseline) = self.pipeline.shared_baseline().current() else {
            return Ok(None);
        };

        let dict = PyDict::new(py);
        dict.set_item("freq", PyArray1::from_vec(py, baseline.frequencies().to_vec()))?;
        dict.set_item("ave_db", PyArray1::from_vec(py, baseline.average_magnitudes().to_vec()))?;
        dict.set_item("ave_phase", PyArray1::from_vec(py, baseline.average_phases().to_vec()))?;
        dict.set_item("std_db", PyArray1::from_vec(py, baseline.std_magnitudes().to_vec()))?;
        dict.set_item("std_phase", PyArray1::from_vec(py, baseline.std_phases().to_vec()))?;
        Ok(Some(dict))
    }

    /// Sweep relative to the calibration baseline
    ///
    /// Returns:
    ///     Tuple of (freq, diff_db, diff_phase) arrays
    fn relative<'py>(
        &self,
        py: Python<'py>,
        freq: PyReadonlyArray1<f64>,
        mag: PyReadonlyArray1<f64>,
        phase: PyReadonlyArray1<f64>,
    ) -> PyResult<(&'py PyArray1<f64>, &'py PyArray1<f64>, &'py PyArray1<f64>)> {
        let baseline = self.pipeline.shared_baseline().current().ok_or_else(|| {
            PyErr::new::<pyo3::exceptions::PyRuntimeError, _>("not calibrated")
        })?;
        let trace = build_trace(read_array(&freq)?, read_array(&mag)?, read_array(&phase)?)?;
        let rel = baseline.relative(&trace).map_err(to_py_err)?;

        Ok((
            PyArray1::from_vec(py, rel.frequencies),
            PyArray1::from_vec(py, rel.magnitudes),
            PyArray1::from_vec(py, rel.phases),
        ))
    }

    /// Timeline as (positions, values) arrays
    fn timeline<'py>(&self, py: Python<'py>) -> (&'py PyArray1<f64>, &'py PyArray1<f64>) {
        let payload = self.pipeline.timeline_payload();
        (
            PyArray1::from_vec(py, payload.positions),
            PyArray1::from_vec(py, payload.values),
        )
    }

    /// Number of completed ticks
    fn ticks(&self) -> u64 {
        self.pipeline.ticks()
    }
}
