//! Restore configuration types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::{Error, NewLayerSpec, Result, Step, StepSelector};

/// Main restore configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Checkpoint selection settings
    pub checkpoint: CheckpointConfig,

    /// Variable remapping settings
    pub remap: RemapConfig,
}

impl RestoreConfig {
    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::InvalidConfig {
            message: format!("Failed to read config {}: {}", path.display(), e),
        })?;
        let config: RestoreConfig = serde_json::from_str(&text)?;
        config.validate()?;
        debug!(path = %path.display(), "Loaded restore configuration");
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let checkpoint = &self.checkpoint;
        if checkpoint.model_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig {
                message: "checkpoint.model_dir must not be empty".to_string(),
            });
        }
        if checkpoint.poll_interval.is_zero() {
            return Err(Error::InvalidConfig {
                message: "checkpoint.poll_interval must be positive".to_string(),
            });
        }
        if let (Some(floor), Some(ceiling)) = (checkpoint.skip_until, checkpoint.stop_after) {
            if ceiling <= floor {
                return Err(Error::InvalidConfig {
                    message: format!(
                        "checkpoint.stop_after ({}) must be greater than skip_until ({})",
                        ceiling, floor
                    ),
                });
            }
        }
        if let Some(pattern) = &self.remap.variable_filter {
            if pattern.is_empty() {
                return Err(Error::InvalidConfig {
                    message: "remap.variable_filter must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Checkpoint selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Directory holding `model.ckpt-<step>` files
    pub model_dir: PathBuf,

    /// Which checkpoint(s) to resolve
    pub selector: StepSelector,

    /// Fall back to the nearest step when a requested step does not exist
    pub find_closest: bool,

    /// Only consider checkpoints with a step strictly greater than this
    pub skip_until: Option<Step>,

    /// Upper bound: continuous mode stops after the first step >= this
    pub stop_after: Option<Step>,

    /// How often to re-list the directory while waiting for checkpoints
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./model"),
            selector: StepSelector::default(),
            find_closest: true,
            skip_until: None,
            stop_after: None,
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// How graph variables are mapped onto checkpoint variables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingMode {
    /// Load every graph variable from the checkpoint variable of the same name
    Identity,

    /// Infer block/layer structure and remap across architectures
    #[default]
    Flexible,
}

/// What to do when one graph variable matches several checkpoint variables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Fail the remapping build
    #[default]
    Reject,

    /// Keep the match found last in checkpoint iteration order
    LastWins,
}

/// Variable remapping configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemapConfig {
    /// Mapping strategy
    pub mode: MappingMode,

    /// Layers present in the graph but absent from the checkpoint
    pub new_layers: NewLayerSpec,

    /// Ambiguous match handling
    pub ambiguity: AmbiguityPolicy,

    /// Regex restricting which checkpoint variables may be loaded
    pub variable_filter: Option<String>,
}

/// Duration serialization helper for human-readable formats
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RestoreConfig::default();
        assert!(config.checkpoint.find_closest);
        assert_eq!(config.checkpoint.selector, StepSelector::Latest);
        assert_eq!(config.remap.mode, MappingMode::Flexible);
        assert_eq!(config.remap.ambiguity, AmbiguityPolicy::Reject);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = RestoreConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RestoreConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.checkpoint.poll_interval, config.checkpoint.poll_interval);
        assert_eq!(parsed.checkpoint.selector, config.checkpoint.selector);
    }

    #[test]
    fn test_partial_config() {
        let json = r#"{
            "checkpoint": {
                "model_dir": "/tmp/run",
                "selector": "all",
                "skip_until": 1000,
                "poll_interval": 500
            },
            "remap": { "new_layers": [[3], [1]], "ambiguity": "last_wins" }
        }"#;
        let config: RestoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.checkpoint.selector, StepSelector::All);
        assert_eq!(config.checkpoint.skip_until, Some(1000));
        assert_eq!(config.checkpoint.poll_interval, Duration::from_millis(500));
        assert!(config.checkpoint.find_closest);
        assert_eq!(config.remap.new_layers, NewLayerSpec::encoder_decoder([3], [1]));
        assert_eq!(config.remap.ambiguity, AmbiguityPolicy::LastWins);
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = RestoreConfig::default();
        config.checkpoint.skip_until = Some(200);
        config.checkpoint.stop_after = Some(100);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));
    }
}
