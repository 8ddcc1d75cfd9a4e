//! Positional correspondence between checkpoint and graph block/layer groups

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use runtime_core::{Error, NewLayerSpec, Result};
use serde::Serialize;
use tracing::debug;

use crate::structure::{BlockLayerCount, ModelStructure, SubTree, BLOCK_TAG, LAYER_TAG};

/// One block/layer group, e.g. `block_002/layer_001`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GroupKey {
    pub block: Option<u32>,
    pub layer: u32,
}

impl GroupKey {
    pub fn new(block: Option<u32>, layer: u32) -> Self {
        Self { block, layer }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(block) = self.block {
            write!(f, "{}{:03}/", BLOCK_TAG, block)?;
        }
        write!(f, "{}{:03}", LAYER_TAG, self.layer)
    }
}

/// Checkpoint group `source` initializes graph group `target` within `scope`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorrespondenceEntry {
    pub scope: SubTree,
    pub source: GroupKey,
    pub target: GroupKey,
}

impl fmt::Display for CorrespondenceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope.prefix() {
            Some(prefix) => write!(
                f,
                "{0}.*{1} -> {0}.*{2}",
                prefix, self.source, self.target
            ),
            None => write!(f, "{} -> {}", self.source, self.target),
        }
    }
}

/// Groups of a sub-tree in row-major (block, layer) order, minus new layers
fn enumerate_groups(count: &BlockLayerCount, new_layers: Option<&BTreeSet<u32>>) -> Vec<GroupKey> {
    let blocks: Vec<Option<u32>> = match count.num_blocks {
        Some(n) => (0..n).map(Some).collect(),
        None => vec![None],
    };

    blocks
        .into_iter()
        .flat_map(|block| (0..count.num_layers).map(move |layer| GroupKey::new(block, layer)))
        .filter(|key| new_layers.map_or(true, |skip| !skip.contains(&key.layer)))
        .collect()
}

/// Full correspondence over every sub-tree of a model
#[derive(Debug, Clone, Default)]
pub struct Correspondence {
    entries: Vec<CorrespondenceEntry>,
    scopes: Vec<SubTree>,
    lookup: HashMap<(SubTree, GroupKey), GroupKey>,
}

impl Correspondence {
    /// Pair the block/layer slots of `source` with those of `target`
    ///
    /// The Nth checkpoint slot of a sub-tree corresponds to the Nth graph slot
    /// once the graph's new layers are removed; the slot counts must agree.
    pub fn build(
        source: &ModelStructure,
        target: &ModelStructure,
        new_layers: &NewLayerSpec,
    ) -> Result<Self> {
        let source_trees: Vec<SubTree> = source.sub_trees().iter().map(|(t, _)| *t).collect();
        let target_trees: Vec<SubTree> = target.sub_trees().iter().map(|(t, _)| *t).collect();
        if source_trees != target_trees {
            return Err(Error::StructuralMismatch {
                scope: format!(
                    "model layout (checkpoint {}, graph {})",
                    layout_name(source),
                    layout_name(target)
                ),
                source_slots: source.slots(),
                target_slots: target.slots(),
            });
        }

        if !new_layers.is_empty() && new_layers.len() != target_trees.len() {
            return Err(Error::InvalidConfig {
                message: format!(
                    "new_layers lists {} sub-trees but the graph has {}",
                    new_layers.len(),
                    target_trees.len()
                ),
            });
        }

        let mut entries = Vec::new();
        for (index, ((scope, source_count), (_, target_count))) in source
            .sub_trees()
            .iter()
            .zip(target.sub_trees())
            .enumerate()
        {
            let sub_tree_entries = Self::build_sub_tree(
                *scope,
                source_count,
                target_count,
                new_layers.for_sub_tree(index),
            )?;
            entries.extend(sub_tree_entries);
        }

        Ok(Self::from_entries(entries))
    }

    /// Correspondence of a single sub-tree
    pub fn build_sub_tree(
        scope: SubTree,
        source: &BlockLayerCount,
        target: &BlockLayerCount,
        new_layers: Option<&BTreeSet<u32>>,
    ) -> Result<Vec<CorrespondenceEntry>> {
        let source_groups = enumerate_groups(source, None);
        let target_groups = enumerate_groups(target, new_layers);

        if source_groups.len() != target_groups.len() {
            return Err(Error::StructuralMismatch {
                scope: scope.to_string(),
                source_slots: source_groups.len(),
                target_slots: target_groups.len(),
            });
        }

        debug!(
            scope = %scope,
            slots = source_groups.len(),
            ?source,
            ?target,
            "Built sub-tree correspondence"
        );

        Ok(source_groups
            .into_iter()
            .zip(target_groups)
            .map(|(source, target)| CorrespondenceEntry {
                scope,
                source,
                target,
            })
            .collect())
    }

    pub fn from_entries(entries: Vec<CorrespondenceEntry>) -> Self {
        let lookup = entries
            .iter()
            .map(|e| ((e.scope, e.source), e.target))
            .collect();
        let mut scopes: Vec<SubTree> = Vec::new();
        for entry in &entries {
            if !scopes.contains(&entry.scope) {
                scopes.push(entry.scope);
            }
        }
        Self {
            entries,
            scopes,
            lookup,
        }
    }

    pub fn entries(&self) -> &[CorrespondenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Graph group initialized from checkpoint group `source` in `scope`
    pub fn target_for(&self, scope: SubTree, source: GroupKey) -> Option<GroupKey> {
        self.lookup.get(&(scope, source)).copied()
    }

    /// Distinct scopes, in entry order
    pub fn scopes(&self) -> &[SubTree] {
        &self.scopes
    }
}

fn layout_name(structure: &ModelStructure) -> &'static str {
    if structure.is_encoder_decoder() {
        "encoder-decoder"
    } else {
        "single stack"
    }
}
