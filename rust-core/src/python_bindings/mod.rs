//! PyO3 bindings for Python integration

use pyo3::prelude::*;

mod engine_bindings;

/// Python module definition
#[pymodule]
fn bandscope(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<engine_bindings::PyBandEngine>()?;
    m.add("FREQ_BANDS", crate::FREQ_BANDS)?;
    Ok(())
}
