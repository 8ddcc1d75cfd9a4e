//! Checkpoint resolver Python bindings
//!
//! Exposes async checkpoint discovery with synchronous Python wrappers.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use checkpoint::{
    CheckpointResolver as RustCheckpointResolver, CheckpointWatcher, Resolution, ResolverConfig,
};
use pyo3::exceptions::{PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBool;
use runtime_core::{CheckpointIdentifier, StepSelector};
use tokio::runtime::Runtime;

use crate::to_py_err;

/// A checkpoint found in the model directory
#[pyclass]
#[derive(Clone)]
pub struct CheckpointInfo {
    /// Checkpoint prefix, e.g. `/tmp/model/model.ckpt-1000`
    #[pyo3(get)]
    pub path: String,

    /// Global step the checkpoint was written at
    #[pyo3(get)]
    pub step: u64,
}

impl From<CheckpointIdentifier> for CheckpointInfo {
    fn from(id: CheckpointIdentifier) -> Self {
        Self {
            path: id.path,
            step: id.step,
        }
    }
}

#[pymethods]
impl CheckpointInfo {
    fn __repr__(&self) -> String {
        format!("CheckpointInfo(path='{}', step={})", self.path, self.step)
    }
}

/// Finds checkpoints in a model directory
///
/// Example:
///     resolver = CheckpointResolver("/tmp/model", find_closest=False)
///
///     # A specific step, a list of steps, every step, or the newest one
///     resolver.resolve(1000)
///     resolver.resolve([1000, 2000])
///     resolver.resolve("all")
///     resolver.resolve(-1)
///
///     # Block until a newer checkpoint is written
///     info = resolver.wait_for_next()
#[pyclass]
pub struct CheckpointResolver {
    inner: Arc<RustCheckpointResolver>,
    runtime: Arc<Runtime>,
    watcher: Mutex<Option<CheckpointWatcher>>,
}

#[pymethods]
impl CheckpointResolver {
    /// Create a resolver over a local model directory
    ///
    /// Args:
    ///     model_dir: Directory holding `model.ckpt-<step>` files
    ///     find_closest: Use the nearest step when a requested one is missing (default: True)
    ///     skip_until: Only consider steps strictly greater than this
    ///     stop_after: Stop waiting once a step at or above this is found
    ///     poll_interval_ms: Directory polling interval while waiting (default: 30000)
    #[new]
    #[pyo3(signature = (model_dir, find_closest=true, skip_until=None, stop_after=None, poll_interval_ms=30_000))]
    fn new(
        model_dir: &str,
        find_closest: bool,
        skip_until: Option<u64>,
        stop_after: Option<u64>,
        poll_interval_ms: u64,
    ) -> PyResult<Self> {
        if poll_interval_ms == 0 {
            return Err(PyValueError::new_err("poll_interval_ms must be positive"));
        }

        let config = ResolverConfig {
            model_dir: PathBuf::from(model_dir),
            find_closest,
            skip_until,
            stop_after,
            poll_interval: std::time::Duration::from_millis(poll_interval_ms),
        };

        // Create tokio runtime for async operations
        let runtime = Runtime::new().map_err(|e| {
            PyRuntimeError::new_err(format!("Failed to create async runtime: {}", e))
        })?;

        Ok(Self {
            inner: Arc::new(RustCheckpointResolver::new(config)),
            runtime: Arc::new(runtime),
            watcher: Mutex::new(None),
        })
    }

    /// Resolve a step selector
    ///
    /// Args:
    ///     selector: A step (int), a list of steps, "all", or "latest"/-1
    ///
    /// Returns:
    ///     List of CheckpointInfo in ascending step order
    fn resolve(&self, py: Python<'_>, selector: &Bound<'_, PyAny>) -> PyResult<Vec<CheckpointInfo>> {
        let selector = extract_selector(selector)?;
        if selector == StepSelector::Continuous {
            return Err(PyValueError::new_err(
                "continuous selection has no fixed result; use wait_for_next()",
            ));
        }

        let inner = self.inner.clone();
        let resolution = py.allow_threads(|| {
            self.runtime
                .block_on(async move { inner.resolve(&selector).await })
        });

        match resolution.map_err(to_py_err)? {
            Resolution::Checkpoints(checkpoints) => {
                Ok(checkpoints.into_iter().map(CheckpointInfo::from).collect())
            }
            Resolution::Watch(_) => Err(PyRuntimeError::new_err("unexpected continuous resolution")),
        }
    }

    /// Block until a checkpoint newer than the last one returned appears
    ///
    /// Returns:
    ///     CheckpointInfo, or None once a step at or above `stop_after` was returned
    fn wait_for_next(&self, py: Python<'_>) -> PyResult<Option<CheckpointInfo>> {
        // Lock only after releasing the GIL
        let next = py.allow_threads(|| {
            let mut guard = self
                .watcher
                .lock()
                .map_err(|_| PyRuntimeError::new_err("checkpoint watcher lock poisoned"))?;
            let watcher = guard.get_or_insert_with(|| self.inner.watch());
            Ok::<_, PyErr>(self.runtime.block_on(watcher.next()))
        })?;
        match next {
            Some(Ok(id)) => Ok(Some(id.into())),
            Some(Err(e)) => Err(to_py_err(e)),
            None => Ok(None),
        }
    }

    /// Steps of every checkpoint in the directory
    fn list_steps(&self, py: Python<'_>) -> PyResult<Vec<u64>> {
        let inner = self.inner.clone();
        let steps = py
            .allow_threads(|| self.runtime.block_on(async move { inner.list_steps().await }))
            .map_err(to_py_err)?;
        Ok(steps.into_iter().collect())
    }

    fn __repr__(&self) -> String {
        format!(
            "CheckpointResolver(model_dir='{}')",
            self.inner.config().model_dir.display()
        )
    }
}

/// Accepts an int, a list of ints, or a selector keyword string
fn extract_selector(selector: &Bound<'_, PyAny>) -> PyResult<StepSelector> {
    if selector.is_none() {
        return Ok(StepSelector::Continuous);
    }
    // bool is an int subclass in Python
    if selector.is_instance_of::<PyBool>() {
        return Err(PyTypeError::new_err("selector must be an int, not a bool"));
    }
    if let Ok(step) = selector.extract::<i64>() {
        return match step {
            -1 => Ok(StepSelector::Latest),
            s if s < 0 => Err(PyValueError::new_err(format!("invalid step {}", s))),
            s => Ok(StepSelector::Step(s as u64)),
        };
    }
    if let Ok(items) = selector.extract::<Vec<Bound<'_, PyAny>>>() {
        let steps = items
            .iter()
            .map(|item| {
                if item.is_instance_of::<PyBool>() {
                    Err(PyTypeError::new_err("steps must be ints, not bools"))
                } else {
                    item.extract::<u64>()
                }
            })
            .collect::<PyResult<Vec<u64>>>()?;
        return Ok(StepSelector::Steps(steps));
    }
    if let Ok(keyword) = selector.extract::<String>() {
        return keyword.parse::<StepSelector>().map_err(PyValueError::new_err);
    }
    Err(PyTypeError::new_err(
        "selector must be an int, a list of ints, or one of \"all\", \"latest\"",
    ))
}
