//! Variable remapping Python bindings

use std::collections::{BTreeSet, HashMap};

use pyo3::exceptions::PyKeyError;
use pyo3::prelude::*;
use remap::RemappingIndex;
use runtime_core::{AmbiguityPolicy, NewLayerSpec};

use crate::to_py_err;

/// Which checkpoint variable initializes each graph variable
///
/// Example:
///     mapping = flexible_mapping(ckpt_vars, graph_vars, new_layers=[[3]])
///     for name in graph_vars:
///         if mapping.should_load(name):
///             assign(name, reader.get_tensor(mapping.source_name(name)))
#[pyclass]
pub struct FlexibleMapping {
    index: RemappingIndex,
}

#[pymethods]
impl FlexibleMapping {
    /// Whether graph variable `name` is restored from the checkpoint
    fn should_load(&self, name: &str) -> bool {
        self.index.is_restorable(name)
    }

    /// Checkpoint variable restoring graph variable `name`
    ///
    /// Raises:
    ///     KeyError: if `name` is not restorable
    fn source_name(&self, name: &str) -> PyResult<String> {
        self.index
            .source_for(name)
            .map(str::to_string)
            .map_err(|_| PyKeyError::new_err(name.to_string()))
    }

    /// All graph -> checkpoint name pairs
    fn assignments(&self) -> HashMap<String, String> {
        self.index
            .iter()
            .map(|(target, source)| (target.to_string(), source.to_string()))
            .collect()
    }

    fn __len__(&self) -> usize {
        self.index.len()
    }

    fn __contains__(&self, name: &str) -> bool {
        self.index.is_restorable(name)
    }

    fn __repr__(&self) -> String {
        format!("FlexibleMapping(restorable={})", self.index.len())
    }
}

/// Build a mapping from checkpoint variables onto graph variables
///
/// Args:
///     checkpoint_vars: Names of the variables stored in the checkpoint
///     graph_vars: Names of the variables of the model being built
///     new_layers: Per sub-tree lists of layer indices that are new in the
///         graph, e.g. [[3]] or [[], [1]] for an encoder-decoder model
///     last_wins: Resolve ambiguous matches to the last checkpoint variable
///         instead of raising (default: False)
#[pyfunction]
#[pyo3(signature = (checkpoint_vars, graph_vars, new_layers=None, last_wins=false))]
pub fn flexible_mapping(
    py: Python<'_>,
    checkpoint_vars: Vec<String>,
    graph_vars: Vec<String>,
    new_layers: Option<Vec<Vec<u32>>>,
    last_wins: bool,
) -> PyResult<FlexibleMapping> {
    let new_layers = NewLayerSpec::new(
        new_layers
            .unwrap_or_default()
            .into_iter()
            .map(|layers| layers.into_iter().collect::<BTreeSet<u32>>())
            .collect(),
    );
    let policy = if last_wins {
        AmbiguityPolicy::LastWins
    } else {
        AmbiguityPolicy::Reject
    };

    let index = py
        .allow_threads(|| RemappingIndex::infer(&checkpoint_vars, &graph_vars, &new_layers, policy))
        .map_err(to_py_err)?;
    Ok(FlexibleMapping { index })
}
