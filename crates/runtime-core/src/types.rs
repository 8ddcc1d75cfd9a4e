//! Core type definitions shared across the workspace

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Training step counter
pub type Step = u64;

/// Slash-delimited variable path, e.g. `encoder/block_002/layer_001/weight`
pub type VariableName = String;

/// A concrete checkpoint discovered in a model directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckpointIdentifier {
    /// Checkpoint prefix path, `<model_dir>/model.ckpt-<step>`
    pub path: String,

    /// Training step embedded in `path`
    pub step: Step,
}

impl CheckpointIdentifier {
    pub fn new(path: impl Into<String>, step: Step) -> Self {
        Self {
            path: path.into(),
            step,
        }
    }
}

impl fmt::Display for CheckpointIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Which checkpoint(s) a caller wants to work with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SelectorRepr", into = "SelectorRepr")]
pub enum StepSelector {
    /// A single step, looked up exactly or by closest distance
    Step(Step),

    /// Several steps, each resolved like `Step`
    Steps(Vec<Step>),

    /// Every checkpoint in the directory
    All,

    /// The checkpoint recorded as newest by the directory manifest
    #[default]
    Latest,

    /// Wait for checkpoints as they are written
    Continuous,
}

impl fmt::Display for StepSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepSelector::Step(step) => write!(f, "step {}", step),
            StepSelector::Steps(steps) => {
                let steps: Vec<String> = steps.iter().map(|s| s.to_string()).collect();
                write!(f, "steps [{}]", steps.join(", "))
            }
            StepSelector::All => f.write_str("all"),
            StepSelector::Latest => f.write_str("latest"),
            StepSelector::Continuous => f.write_str("continuous"),
        }
    }
}

impl FromStr for StepSelector {
    type Err = String;

    /// Parses the command-line form: `all`, `latest`, `-1`, `continuous`,
    /// `none`, a step, or a comma-separated list of steps.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "all" => return Ok(StepSelector::All),
            "latest" | "-1" => return Ok(StepSelector::Latest),
            "continuous" | "none" | "" => return Ok(StepSelector::Continuous),
            _ => {}
        }

        let steps = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<Step>()
                    .map_err(|e| format!("invalid step selector '{}': {}", s, e))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        match steps.as_slice() {
            [step] if !s.contains(',') => Ok(StepSelector::Step(*step)),
            _ => Ok(StepSelector::Steps(steps)),
        }
    }
}

/// Serialized shape of a selector: `1000`, `[100, 200]`, `"all"`,
/// `"latest"`, `-1`, `"continuous"` or `null`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SelectorRepr {
    Unset,
    Step(i64),
    Steps(Vec<Step>),
    Keyword(String),
}

impl TryFrom<SelectorRepr> for StepSelector {
    type Error = String;

    fn try_from(repr: SelectorRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            SelectorRepr::Unset => Ok(StepSelector::Continuous),
            SelectorRepr::Step(-1) => Ok(StepSelector::Latest),
            SelectorRepr::Step(step) if step < 0 => {
                Err(format!("negative checkpoint step {}", step))
            }
            SelectorRepr::Step(step) => Ok(StepSelector::Step(step as Step)),
            SelectorRepr::Steps(steps) => Ok(StepSelector::Steps(steps)),
            SelectorRepr::Keyword(keyword) => keyword.parse(),
        }
    }
}

impl From<StepSelector> for SelectorRepr {
    fn from(selector: StepSelector) -> Self {
        match selector {
            StepSelector::Step(step) => match i64::try_from(step) {
                Ok(step) => SelectorRepr::Step(step),
                Err(_) => SelectorRepr::Keyword(step.to_string()),
            },
            StepSelector::Steps(steps) => SelectorRepr::Steps(steps),
            StepSelector::All => SelectorRepr::Keyword("all".to_string()),
            StepSelector::Latest => SelectorRepr::Keyword("latest".to_string()),
            StepSelector::Continuous => SelectorRepr::Keyword("continuous".to_string()),
        }
    }
}

/// Layer indices that exist in the current graph but have no counterpart in
/// the checkpoint, one set per sub-tree (encoder then decoder, or a single
/// set for a single-stack model).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewLayerSpec(Vec<BTreeSet<u32>>);

impl NewLayerSpec {
    pub fn new(per_sub_tree: Vec<BTreeSet<u32>>) -> Self {
        Self(per_sub_tree)
    }

    /// New layers for a single-stack model
    pub fn single(layers: impl IntoIterator<Item = u32>) -> Self {
        Self(vec![layers.into_iter().collect()])
    }

    /// New layers for an encoder-decoder model
    pub fn encoder_decoder(
        encoder: impl IntoIterator<Item = u32>,
        decoder: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self(vec![encoder.into_iter().collect(), decoder.into_iter().collect()])
    }

    /// New layer indices of the sub-tree at `index`
    pub fn for_sub_tree(&self, index: usize) -> Option<&BTreeSet<u32>> {
        self.0.get(index)
    }

    /// Number of sub-trees described
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_from_str() {
        assert_eq!("all".parse::<StepSelector>().unwrap(), StepSelector::All);
        assert_eq!("-1".parse::<StepSelector>().unwrap(), StepSelector::Latest);
        assert_eq!(
            "none".parse::<StepSelector>().unwrap(),
            StepSelector::Continuous
        );
        assert_eq!(
            "1000".parse::<StepSelector>().unwrap(),
            StepSelector::Step(1000)
        );
        assert_eq!(
            "100, 300".parse::<StepSelector>().unwrap(),
            StepSelector::Steps(vec![100, 300])
        );
        assert!("soon".parse::<StepSelector>().is_err());
    }

    #[test]
    fn test_selector_json_forms() {
        let cases = [
            ("1000", StepSelector::Step(1000)),
            ("[5, 10]", StepSelector::Steps(vec![5, 10])),
            ("\"all\"", StepSelector::All),
            ("\"latest\"", StepSelector::Latest),
            ("-1", StepSelector::Latest),
            ("null", StepSelector::Continuous),
            ("\"continuous\"", StepSelector::Continuous),
        ];
        for (json, expected) in cases {
            let parsed: StepSelector = serde_json::from_str(json).unwrap();
            assert_eq!(parsed, expected, "parsing {}", json);
        }

        assert!(serde_json::from_str::<StepSelector>("-7").is_err());
    }

    #[test]
    fn test_selector_serializes_back() {
        let json = serde_json::to_string(&StepSelector::All).unwrap();
        assert_eq!(json, "\"all\"");
        let json = serde_json::to_string(&StepSelector::Step(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_selector_defaults_to_latest() {
        assert_eq!(StepSelector::default(), StepSelector::Latest);
    }

    #[test]
    fn test_new_layer_spec() {
        let spec: NewLayerSpec = serde_json::from_str("[[3], [1, 2]]").unwrap();
        assert_eq!(spec, NewLayerSpec::encoder_decoder([3], [1, 2]));
        assert_eq!(spec.len(), 2);
        assert!(spec.for_sub_tree(1).unwrap().contains(&2));
        assert!(spec.for_sub_tree(2).is_none());
        assert!(NewLayerSpec::default().is_empty());
    }
}
