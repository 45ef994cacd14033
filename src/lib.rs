pub mod config;
pub mod decisions;
pub mod distribution;
pub mod error;
pub mod lookup;
pub mod models;
pub mod scenario;
pub mod session;
pub mod topology;

#[cfg(feature = "python")]
pub mod python;

pub use error::{Error, Result};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// A Python module implemented in Rust. The name of this function must match
/// the `lib.name` setting in the `Cargo.toml`, else Python will not be able to
/// import the module.
#[cfg(feature = "python")]
#[pymodule]
fn coffee_network(_py: Python, m: &PyModule) -> PyResult<()> {
    pyo3_log::init();

    m.add_function(wrap_pyfunction!(python::evaluate_deterministic, m)?)?;
    m.add_function(wrap_pyfunction!(python::decisions_str, m)?)?;
    m.add_function(wrap_pyfunction!(python::round_shares, m)?)?;
    m.add_class::<python::PyStochasticModel>()?;
    Ok(())
}
