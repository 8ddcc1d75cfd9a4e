//! Name-level matching of checkpoint variables against graph variables

use crate::correspondence::{Correspondence, GroupKey};
use crate::structure::{indexed_segment, BLOCK_TAG, LAYER_TAG};

/// Last path segment of a variable name
pub fn leaf_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// A variable name split around its first block/layer group
///
/// `encoder/block_002/layer_001/SelfAttention/q` splits into head
/// `encoder/`, key `block_002/layer_001` and tail `/SelfAttention/q`.
/// A `block_NNN` segment only belongs to the group when it directly
/// precedes the layer segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupedName<'a> {
    pub head: &'a str,
    pub key: GroupKey,
    pub tail: &'a str,
}

impl<'a> GroupedName<'a> {
    /// `None` when the name has no `layer_NNN` segment
    pub fn parse(name: &'a str) -> Option<Self> {
        let mut offset = 0;
        let mut block: Option<(usize, u32)> = None;

        for segment in name.split('/') {
            let end = offset + segment.len();
            if let Some(layer) = indexed_segment(segment, LAYER_TAG) {
                let (start, block) = match block {
                    Some((start, index)) => (start, Some(index)),
                    None => (offset, None),
                };
                return Some(Self {
                    head: &name[..start],
                    key: GroupKey::new(block, layer),
                    tail: &name[end..],
                });
            }
            block = indexed_segment(segment, BLOCK_TAG).map(|index| (offset, index));
            offset = end + 1;
        }

        None
    }

    /// The same name with its group replaced by `key`
    pub fn rebuild(&self, key: GroupKey) -> String {
        format!("{}{}{}", self.head, key, self.tail)
    }
}

/// A name decomposed once, for repeated matching
#[derive(Debug, Clone, Copy)]
pub(crate) struct ParsedName<'a> {
    pub name: &'a str,
    pub grouped: Option<GroupedName<'a>>,
}

impl<'a> ParsedName<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            grouped: GroupedName::parse(name),
        }
    }
}

/// Decides whether a checkpoint variable initializes a graph variable
///
/// Names without a layer group only match themselves. Grouped names match
/// when they share the leaf segment and substituting the graph's group for
/// the checkpoint's group, as paired by the correspondence within a sub-tree
/// admitting both names, turns one name into the other.
#[derive(Debug, Clone, Copy)]
pub struct VariableMatcher<'c> {
    correspondence: &'c Correspondence,
}

impl<'c> VariableMatcher<'c> {
    pub fn new(correspondence: &'c Correspondence) -> Self {
        Self { correspondence }
    }

    pub fn matches(&self, source: &str, target: &str) -> bool {
        self.matches_parsed(&ParsedName::new(source), &ParsedName::new(target))
    }

    pub(crate) fn matches_parsed(&self, source: &ParsedName<'_>, target: &ParsedName<'_>) -> bool {
        let (src, tgt) = match (&source.grouped, &target.grouped) {
            (Some(src), Some(tgt)) => (src, tgt),
            _ => return source.name == target.name,
        };

        if leaf_name(source.name) != leaf_name(target.name) {
            return false;
        }

        if src.head != tgt.head || src.tail != tgt.tail {
            return false;
        }

        self.correspondence
            .scopes()
            .iter()
            .filter(|scope| scope.admits(src.head))
            .any(|&scope| self.correspondence.target_for(scope, src.key) == Some(tgt.key))
    }

    /// Graph name initialized by `source` under the correspondence, if any
    pub fn translate(&self, source: &str) -> Option<String> {
        let grouped = GroupedName::parse(source)?;
        self.correspondence
            .scopes()
            .iter()
            .filter(|scope| scope.admits(grouped.head))
            .find_map(|&scope| self.correspondence.target_for(scope, grouped.key))
            .map(|key| grouped.rebuild(key))
    }
}
