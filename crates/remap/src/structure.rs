//! Block/layer structure inference from variable names

use serde::Serialize;
use std::fmt;

pub(crate) const BLOCK_TAG: &str = "block_";
pub(crate) const LAYER_TAG: &str = "layer_";

/// Group indices are always zero-padded to exactly this many digits.
/// Models with 1000 or more blocks or layers are not supported.
pub(crate) const INDEX_WIDTH: usize = 3;

/// Index of a path segment that is exactly `tag` followed by three digits
pub(crate) fn indexed_segment(segment: &str, tag: &str) -> Option<u32> {
    let digits = segment.strip_prefix(tag)?;
    if digits.len() == INDEX_WIDTH && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

/// A repeated stack of blocks/layers within a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTree {
    /// Names rooted at `encoder/`
    Encoder,

    /// Names rooted at `decoder/`
    Decoder,

    /// The single stack of a model without an encoder
    Stack,
}

impl SubTree {
    /// Root prefix of the sub-tree, if it has one
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            SubTree::Encoder => Some("encoder/"),
            SubTree::Decoder => Some("decoder/"),
            SubTree::Stack => None,
        }
    }

    /// Whether `path` lies inside this sub-tree
    pub fn admits(self, path: &str) -> bool {
        self.prefix().map_or(true, |prefix| path.starts_with(prefix))
    }
}

impl fmt::Display for SubTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().unwrap_or("stack"))
    }
}

/// Number of blocks and layers per block in one sub-tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockLayerCount {
    /// `None` when layers are not grouped into blocks
    pub num_blocks: Option<u32>,

    /// Layers per block; 0 when no layer group was found
    pub num_layers: u32,
}

impl BlockLayerCount {
    pub fn new(num_blocks: Option<u32>, num_layers: u32) -> Self {
        Self {
            num_blocks,
            num_layers,
        }
    }

    /// Total block/layer slots
    pub fn slots(&self) -> usize {
        self.num_blocks.unwrap_or(1) as usize * self.num_layers as usize
    }
}

/// Block/layer counts of every sub-tree of a model, encoder first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelStructure {
    sub_trees: Vec<(SubTree, BlockLayerCount)>,
}

impl ModelStructure {
    pub fn new(sub_trees: Vec<(SubTree, BlockLayerCount)>) -> Self {
        Self { sub_trees }
    }

    /// Infer the structure from a set of variable names
    ///
    /// The model is encoder-decoder if any name starts with `encoder/`.
    /// Each sub-tree counts the highest `block_NNN` and `layer_NNN` segment
    /// among the names rooted under it.
    pub fn infer<S: AsRef<str>>(names: &[S]) -> Self {
        let encoder_decoder = names
            .iter()
            .any(|n| n.as_ref().starts_with("encoder/"));

        let trees: &[SubTree] = if encoder_decoder {
            &[SubTree::Encoder, SubTree::Decoder]
        } else {
            &[SubTree::Stack]
        };

        let sub_trees = trees
            .iter()
            .map(|&tree| {
                let num_blocks = max_index(names, tree, BLOCK_TAG).map(|n| n + 1);
                let num_layers = max_index(names, tree, LAYER_TAG).map_or(0, |n| n + 1);
                (tree, BlockLayerCount::new(num_blocks, num_layers))
            })
            .collect();

        Self { sub_trees }
    }

    pub fn sub_trees(&self) -> &[(SubTree, BlockLayerCount)] {
        &self.sub_trees
    }

    pub fn is_encoder_decoder(&self) -> bool {
        self.sub_trees.iter().any(|(tree, _)| *tree == SubTree::Encoder)
    }

    /// Counts of one sub-tree
    pub fn get(&self, tree: SubTree) -> Option<&BlockLayerCount> {
        self.sub_trees
            .iter()
            .find(|(t, _)| *t == tree)
            .map(|(_, count)| count)
    }

    /// Total block/layer slots over all sub-trees
    pub fn slots(&self) -> usize {
        self.sub_trees.iter().map(|(_, count)| count.slots()).sum()
    }
}

fn max_index<S: AsRef<str>>(names: &[S], tree: SubTree, tag: &str) -> Option<u32> {
    names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| tree.admits(name))
        .flat_map(|name| name.split('/'))
        .filter_map(|segment| indexed_segment(segment, tag))
        .max()
}
