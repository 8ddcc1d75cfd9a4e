//! Restore planning service
//!
//! Wires checkpoint resolution, checkpoint variable listing and variable
//! remapping together for a training or evaluation loop.

use std::sync::Arc;

use checkpoint::{
    CheckpointResolver, CheckpointWatcher, Resolution, ResolverConfig, SidecarVariableSource,
    VariableSource,
};
use regex::Regex;
use remap::{CustomMapping, RemappingIndex, RestorePlan, RestoreStrategy, VariableMapping};
use runtime_core::{CheckpointIdentifier, Error, MappingMode, RestoreConfig, Result, StepSelector};
use storage::{LocalStorage, StorageBackend};
use tracing::{info, instrument};

/// Resolves checkpoints and plans how they initialize a graph
pub struct RestoreService {
    config: RestoreConfig,
    resolver: CheckpointResolver,
    variables: Arc<dyn VariableSource>,
    variable_filter: Option<Regex>,
    custom: Option<Arc<dyn RestoreStrategy>>,
}

impl RestoreService {
    /// Create a service over the local model directory
    pub fn new(config: RestoreConfig) -> Result<Self> {
        let storage: Arc<dyn StorageBackend> =
            Arc::new(LocalStorage::new(&config.checkpoint.model_dir));
        let variables = Arc::new(SidecarVariableSource::new(Arc::clone(&storage)));
        Self::with_parts(config, storage, variables)
    }

    /// Create a service over an arbitrary backend and variable source
    pub fn with_parts(
        config: RestoreConfig,
        storage: Arc<dyn StorageBackend>,
        variables: Arc<dyn VariableSource>,
    ) -> Result<Self> {
        config.validate()?;

        let variable_filter = config
            .remap
            .variable_filter
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| Error::InvalidConfig {
                message: format!("remap.variable_filter is not a valid regex: {}", e),
            })?;

        let resolver =
            CheckpointResolver::with_storage(ResolverConfig::from(&config.checkpoint), storage);

        Ok(Self {
            config,
            resolver,
            variables,
            variable_filter,
            custom: None,
        })
    }

    /// Use a caller-supplied mapping instead of the configured mode
    pub fn with_custom_mapping(mut self, custom: CustomMapping) -> Self {
        self.custom = Some(Arc::new(VariableMapping::Custom(custom)));
        self
    }

    pub fn config(&self) -> &RestoreConfig {
        &self.config
    }

    pub fn resolver(&self) -> &CheckpointResolver {
        &self.resolver
    }

    /// Resolve a selector against the model directory
    pub async fn resolve(&self, selector: &StepSelector) -> Result<Resolution> {
        self.resolver.resolve(selector).await
    }

    /// Watch the model directory for new checkpoints
    pub fn watch(&self) -> CheckpointWatcher {
        self.resolver.watch()
    }

    /// Restore strategy for one checkpoint/graph pair
    pub fn strategy_for<S, T>(
        &self,
        checkpoint_names: &[S],
        graph_names: &[T],
    ) -> Result<Arc<dyn RestoreStrategy>>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        if let Some(custom) = &self.custom {
            return Ok(Arc::clone(custom));
        }

        let remap = &self.config.remap;
        let mapping = match remap.mode {
            MappingMode::Identity => VariableMapping::Identity,
            MappingMode::Flexible => VariableMapping::Remapped(RemappingIndex::infer(
                checkpoint_names,
                graph_names,
                &remap.new_layers,
                remap.ambiguity,
            )?),
        };
        Ok(Arc::new(mapping))
    }

    /// Plan how `checkpoint` initializes a graph holding `graph_names`
    #[instrument(skip(self, graph_names), fields(step = checkpoint.step))]
    pub async fn plan<T>(
        &self,
        checkpoint: &CheckpointIdentifier,
        graph_names: &[T],
    ) -> Result<RestorePlan>
    where
        T: AsRef<str> + Sync,
    {
        let checkpoint_names = self.variables.variable_names(checkpoint).await?;
        let strategy = self.strategy_for(&checkpoint_names, graph_names)?;
        RestorePlan::build(
            &*strategy,
            &checkpoint_names,
            graph_names,
            self.variable_filter.as_ref(),
        )
    }

    /// Plan every checkpoint a finite selector resolves to
    pub async fn plan_all<T>(
        &self,
        selector: &StepSelector,
        graph_names: &[T],
    ) -> Result<Vec<(CheckpointIdentifier, RestorePlan)>>
    where
        T: AsRef<str> + Sync,
    {
        let checkpoints = match self.resolve(selector).await? {
            Resolution::Checkpoints(checkpoints) => checkpoints,
            Resolution::Watch(_) => {
                return Err(Error::InvalidConfig {
                    message: format!("selector {} has no finite set of checkpoints", selector),
                })
            }
        };

        let mut plans = Vec::with_capacity(checkpoints.len());
        for checkpoint in checkpoints {
            let plan = self.plan(&checkpoint, graph_names).await?;
            plans.push((checkpoint, plan));
        }

        info!(count = plans.len(), "Planned restores");
        Ok(plans)
    }
}
