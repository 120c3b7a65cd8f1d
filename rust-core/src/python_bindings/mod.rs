//! PyO3 bindings for the Qt host application

use pyo3::prelude::*;

mod demo_bindings;
mod pipeline_bindings;

use crate::error::PipelineError;

/// Map pipeline errors onto Python exceptions
fn to_py_err(err: PipelineError) -> PyErr {
    match err {
        PipelineError::Acquisition(e) => {
            PyErr::new::<pyo3::exceptions::PyIOError, _>(e.to_string())
        }
        e @ (PipelineError::Config(_)
        | PipelineError::SweepCount { .. }
        | PipelineError::GridMismatch { .. }) => {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string())
        }
        other => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(other.to_string()),
    }
}

/// Python module definition
#[pymodule]
fn mring(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<pipeline_bindings::PyPipeline>()?;
    m.add_function(wrap_pyfunction!(demo_bindings::quantize, m)?)?;
    m.add("SENTINEL_TOLERANCE", crate::demo::SENTINEL_TOLERANCE)?;

    Ok(())
}
