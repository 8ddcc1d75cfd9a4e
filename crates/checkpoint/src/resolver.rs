//! Resolution of step selectors into concrete checkpoints

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use runtime_core::{CheckpointConfig, CheckpointIdentifier, Error, Result, Step, StepSelector};
use storage::{LocalStorage, StorageBackend};
use tracing::{debug, info, instrument};

use crate::codec::{checkpoint_path, format_step, parse_step, INDEX_SUFFIX};
use crate::manifest::{CheckpointState, MANIFEST_FILE};
use crate::watcher::CheckpointWatcher;

/// Checkpoint resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Directory holding the checkpoints
    pub model_dir: PathBuf,

    /// Substitute the nearest existing step for a missing one
    pub find_closest: bool,

    /// Floor: only steps strictly greater than this are considered
    pub skip_until: Option<Step>,

    /// Ceiling: enumerations keep steps <= this, watching stops at the first step >= this
    pub stop_after: Option<Step>,

    /// Poll interval while watching for new checkpoints
    pub poll_interval: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./model"),
            find_closest: true,
            skip_until: None,
            stop_after: None,
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl From<&CheckpointConfig> for ResolverConfig {
    fn from(config: &CheckpointConfig) -> Self {
        Self {
            model_dir: config.model_dir.clone(),
            find_closest: config.find_closest,
            skip_until: config.skip_until,
            stop_after: config.stop_after,
            poll_interval: config.poll_interval,
        }
    }
}

/// Outcome of resolving a selector
pub enum Resolution {
    /// A finite list of checkpoints in ascending step order
    Checkpoints(Vec<CheckpointIdentifier>),

    /// A watcher producing checkpoints as they are written
    Watch(CheckpointWatcher),
}

/// Finds checkpoints in a model directory
pub struct CheckpointResolver {
    config: ResolverConfig,
    storage: Arc<dyn StorageBackend>,
}

impl CheckpointResolver {
    /// Create a resolver over the local filesystem
    pub fn new(config: ResolverConfig) -> Self {
        let storage = Arc::new(LocalStorage::new(&config.model_dir));
        Self { config, storage }
    }

    /// Create a resolver over an arbitrary backend rooted at the model directory
    pub fn with_storage(config: ResolverConfig, storage: Arc<dyn StorageBackend>) -> Self {
        Self { config, storage }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Storage backend rooted at the model directory
    pub fn storage(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.storage)
    }

    /// Identifier for `step` in this model directory
    pub fn identifier(&self, step: Step) -> CheckpointIdentifier {
        CheckpointIdentifier::new(checkpoint_path(&self.config.model_dir, step), step)
    }

    /// Resolve a selector
    #[instrument(skip(self), fields(model_dir = %self.config.model_dir.display()))]
    pub async fn resolve(&self, selector: &StepSelector) -> Result<Resolution> {
        let checkpoints = match selector {
            StepSelector::Step(step) if self.config.find_closest => vec![self.closest(*step).await?],
            StepSelector::Step(step) => vec![self.exact(*step).await?],
            StepSelector::Steps(steps) => self.steps(steps).await?,
            StepSelector::All => self.all().await?,
            StepSelector::Latest => vec![self.latest().await?],
            StepSelector::Continuous => return Ok(Resolution::Watch(self.watch())),
        };
        Ok(Resolution::Checkpoints(checkpoints))
    }

    /// Every distinct step present in the directory
    pub async fn list_steps(&self) -> Result<BTreeSet<Step>> {
        list_checkpoint_steps(self.storage.as_ref()).await
    }

    /// Whether the index file of checkpoint `step` exists
    pub async fn exists(&self, step: Step) -> Result<bool> {
        Ok(self.list_steps().await?.contains(&step))
    }

    /// The checkpoint at exactly `step`
    pub async fn exact(&self, step: Step) -> Result<CheckpointIdentifier> {
        if self.exists(step).await? {
            Ok(self.identifier(step))
        } else {
            Err(self.not_found(format!("step {}", step)))
        }
    }

    /// The checkpoint whose step is nearest to `target`, ties going to the lower step
    pub async fn closest(&self, target: Step) -> Result<CheckpointIdentifier> {
        let candidates = self.bounded(self.list_steps().await?);
        let closest = nearest_step(&candidates, target)
            .ok_or_else(|| self.not_found(format!("step closest to {}", target)))?;

        if closest != target {
            info!(
                step = closest,
                requested = target,
                "Using checkpoint closest to requested step"
            );
        }
        Ok(self.identifier(closest))
    }

    /// Resolve each requested step, dropping exact misses and duplicates
    pub async fn steps(&self, requested: &[Step]) -> Result<Vec<CheckpointIdentifier>> {
        let candidates = self.bounded(self.list_steps().await?);

        let resolved: BTreeSet<Step> = if self.config.find_closest {
            requested
                .iter()
                .filter_map(|&step| nearest_step(&candidates, step))
                .collect()
        } else {
            requested
                .iter()
                .copied()
                .filter(|step| candidates.contains(step))
                .collect()
        };

        if resolved.is_empty() {
            let requested: Vec<String> = requested.iter().map(|s| s.to_string()).collect();
            return Err(self.not_found(format!("steps [{}]", requested.join(", "))));
        }

        debug!(count = resolved.len(), "Resolved requested steps");
        Ok(resolved.into_iter().map(|s| self.identifier(s)).collect())
    }

    /// Every checkpoint above the floor (and up to the ceiling), ascending
    pub async fn all(&self) -> Result<Vec<CheckpointIdentifier>> {
        let steps = self.bounded(self.list_steps().await?);
        debug!(count = steps.len(), "Enumerated checkpoints");
        Ok(steps.into_iter().map(|s| self.identifier(s)).collect())
    }

    /// The checkpoint recorded as newest in the directory manifest
    pub async fn latest(&self) -> Result<CheckpointIdentifier> {
        let data = match self.storage.read(MANIFEST_FILE).await {
            Ok(data) => data,
            Err(Error::StoragePathNotFound { .. }) => {
                return Err(self.not_found("latest (no checkpoint manifest)".to_string()))
            }
            Err(e) => return Err(e),
        };

        let text = String::from_utf8_lossy(&data);
        let state = CheckpointState::parse(&text)?;
        let step = parse_step(&state.model_checkpoint_path)?;

        if !self.exists(step).await? {
            return Err(self.not_found(format!(
                "latest ({} listed in manifest but missing)",
                state.model_checkpoint_path
            )));
        }

        debug!(step, "Resolved latest checkpoint from manifest");
        Ok(self.identifier(step))
    }

    /// Watch the directory for new checkpoints
    pub fn watch(&self) -> CheckpointWatcher {
        CheckpointWatcher::new(
            Arc::clone(&self.storage),
            self.config.model_dir.clone(),
            self.config.skip_until,
            self.config.stop_after,
            self.config.poll_interval,
        )
    }

    fn bounded(&self, steps: BTreeSet<Step>) -> BTreeSet<Step> {
        let floor = self.config.skip_until;
        let ceiling = self.config.stop_after;
        steps
            .into_iter()
            .filter(|&s| floor.map_or(true, |f| s > f) && ceiling.map_or(true, |c| s <= c))
            .collect()
    }

    fn not_found(&self, requested: String) -> Error {
        Error::CheckpointNotFound {
            requested,
            model_dir: self.config.model_dir.display().to_string(),
        }
    }
}

/// Steps of every complete checkpoint directly inside the storage root
///
/// A step counts only once `model.ckpt-<step>.index` is listed. Data shards,
/// variable indexes and other files sharing the stem never create a step.
pub(crate) async fn list_checkpoint_steps(storage: &dyn StorageBackend) -> Result<BTreeSet<Step>> {
    let mut steps = BTreeSet::new();
    for name in storage.list("").await? {
        let indexed = name
            .strip_suffix(INDEX_SUFFIX)
            .and_then(|stem| parse_step(stem).ok().filter(|&step| stem == format_step(step)));
        match indexed {
            Some(step) => {
                steps.insert(step);
            }
            None => debug!(file = %name, "Skipping file without a checkpoint index"),
        }
    }
    Ok(steps)
}

fn nearest_step(candidates: &BTreeSet<Step>, target: Step) -> Option<Step> {
    candidates
        .iter()
        .copied()
        .min_by_key(|&step| (step.abs_diff(target), step))
}
