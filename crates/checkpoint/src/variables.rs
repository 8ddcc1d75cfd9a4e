//! Name-level view of the variables stored in a checkpoint
//!
//! Remapping never touches tensor contents, so all it needs from the
//! checkpoint store is the list of stored variable names.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use runtime_core::{CheckpointIdentifier, Error, Result, Step};
use serde::{Deserialize, Serialize};
use storage::StorageBackend;
use tracing::{debug, instrument};

use crate::codec::format_step;

/// Source of stored variable names for a checkpoint
#[async_trait]
pub trait VariableSource: Send + Sync {
    /// Names of every variable stored in `checkpoint`
    async fn variable_names(&self, checkpoint: &CheckpointIdentifier) -> Result<Vec<String>>;
}

/// Variable index file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableIndex {
    pub variables: Vec<String>,
}

impl VariableIndex {
    pub fn new(variables: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            variables: variables.into_iter().map(Into::into).collect(),
        }
    }

    /// Index file name for `step`, sharing the checkpoint stem
    pub fn file_name(step: Step) -> String {
        format!("{}.vars.json", format_step(step))
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec_pretty(self)?))
    }
}

/// Reads `model.ckpt-<step>.vars.json` next to each checkpoint
pub struct SidecarVariableSource {
    storage: Arc<dyn StorageBackend>,
}

impl SidecarVariableSource {
    /// `storage` must be rooted at the model directory
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl VariableSource for SidecarVariableSource {
    #[instrument(skip(self), fields(step = checkpoint.step))]
    async fn variable_names(&self, checkpoint: &CheckpointIdentifier) -> Result<Vec<String>> {
        let file_name = VariableIndex::file_name(checkpoint.step);
        let data = match self.storage.read(&file_name).await {
            Ok(data) => data,
            Err(Error::StoragePathNotFound { .. }) => {
                return Err(Error::CheckpointNotFound {
                    requested: format!("variable index {}", file_name),
                    model_dir: checkpoint.path.clone(),
                })
            }
            Err(e) => return Err(e),
        };

        let index: VariableIndex = serde_json::from_slice(&data)?;
        debug!(count = index.variables.len(), "Loaded checkpoint variable index");
        Ok(index.variables)
    }
}

/// Variable names held in memory, keyed by step
#[derive(Debug, Clone, Default)]
pub struct InMemoryVariableSource {
    by_step: HashMap<Step, Vec<String>>,
}

impl InMemoryVariableSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the variable names stored at `step`
    pub fn insert(&mut self, step: Step, names: impl IntoIterator<Item = impl Into<String>>) {
        self.by_step
            .insert(step, names.into_iter().map(Into::into).collect());
    }
}

#[async_trait]
impl VariableSource for InMemoryVariableSource {
    async fn variable_names(&self, checkpoint: &CheckpointIdentifier) -> Result<Vec<String>> {
        self.by_step
            .get(&checkpoint.step)
            .cloned()
            .ok_or_else(|| Error::CheckpointNotFound {
                requested: format!("variables of step {}", checkpoint.step),
                model_dir: checkpoint.path.clone(),
            })
    }
}
