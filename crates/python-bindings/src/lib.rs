//! Python bindings for checkpoint restore
//!
//! This crate provides PyO3 bindings exposing checkpoint discovery and
//! variable remapping to a Python training loop:
//!
//! - `CheckpointResolver`: Resolve step selectors and wait for new checkpoints
//! - `flexible_mapping`: Map graph variables onto a structurally different checkpoint
//!
//! # Example
//!
//! ```python
//! from ckpt_restore import CheckpointResolver, flexible_mapping
//!
//! resolver = CheckpointResolver("/tmp/model", skip_until=1000)
//! for ckpt in resolver.resolve("all"):
//!     print(ckpt.path, ckpt.step)
//!
//! mapping = flexible_mapping(ckpt_vars, graph_vars, new_layers=[[3]])
//! if mapping.should_load("decoder/layer_002/w"):
//!     source = mapping.source_name("decoder/layer_002/w")
//! ```

use pyo3::exceptions::{PyFileNotFoundError, PyIOError, PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use runtime_core::Error;

mod checkpoint;
mod mapping;

/// Convert a runtime error into the closest Python exception
pub(crate) fn to_py_err(err: Error) -> PyErr {
    let message = err.to_string();
    match err {
        Error::CheckpointNotFound { .. } | Error::StoragePathNotFound { .. } => {
            PyFileNotFoundError::new_err(message)
        }
        Error::NotRestorable { .. } => PyKeyError::new_err(message),
        Error::MalformedIdentifier { .. }
        | Error::StructuralMismatch { .. }
        | Error::AmbiguousCorrespondence { .. }
        | Error::InvalidConfig { .. } => PyValueError::new_err(message),
        Error::Storage { .. } | Error::Io(_) => PyIOError::new_err(message),
        Error::Serialization(_) | Error::Internal { .. } => PyRuntimeError::new_err(message),
    }
}

/// Python module for checkpoint restore
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Register classes
    m.add_class::<checkpoint::CheckpointInfo>()?;
    m.add_class::<checkpoint::CheckpointResolver>()?;
    m.add_class::<mapping::FlexibleMapping>()?;
    m.add_function(wrap_pyfunction!(mapping::flexible_mapping, m)?)?;

    // Add version info
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
