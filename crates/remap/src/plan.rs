//! Restore plan for one checkpoint and graph

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use runtime_core::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::strategy::RestoreStrategy;

/// Graph variables that will be initialized from a checkpoint, and what is
/// left over on either side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestorePlan {
    /// Graph variable -> checkpoint variable
    pub assignments: BTreeMap<String, String>,

    /// Checkpoint variables that nothing in the graph loads
    pub unused_checkpoint_variables: BTreeSet<String>,

    /// Graph variables keeping their fresh initialization
    pub uninitialized_graph_variables: BTreeSet<String>,
}

impl RestorePlan {
    /// Plan which graph variables `strategy` restores from the checkpoint
    ///
    /// `variable_filter` restricts the checkpoint variables that may be
    /// loaded to those whose name contains a match.
    pub fn build<S, T>(
        strategy: &dyn RestoreStrategy,
        checkpoint_names: &[S],
        graph_names: &[T],
        variable_filter: Option<&Regex>,
    ) -> Result<Self>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let available: BTreeSet<&str> = checkpoint_names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| variable_filter.map_or(true, |filter| filter.is_match(name)))
            .collect();

        let mut assignments = BTreeMap::new();
        let mut referenced = BTreeSet::new();
        for target in graph_names.iter().map(AsRef::as_ref) {
            if !strategy.should_restore(target) {
                continue;
            }
            let source = strategy.source_name(target)?;
            if available.contains(source.as_str()) {
                assignments.insert(target.to_string(), source.clone());
            } else {
                debug!(variable = target, source = %source, "Source variable not in checkpoint");
            }
            referenced.insert(source);
        }

        let unused_checkpoint_variables: BTreeSet<String> = available
            .iter()
            .filter(|name| !referenced.contains(**name))
            .map(|name| name.to_string())
            .collect();

        let uninitialized_graph_variables: BTreeSet<String> = graph_names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !assignments.contains_key(*name))
            .map(str::to_string)
            .collect();

        info!(
            restored = assignments.len(),
            unused = unused_checkpoint_variables.len(),
            uninitialized = uninitialized_graph_variables.len(),
            "Planned checkpoint restore"
        );
        debug!(variables = ?unused_checkpoint_variables, "Checkpoint variables not used");
        debug!(variables = ?uninitialized_graph_variables, "Graph variables not initialized");

        Ok(Self {
            assignments,
            unused_checkpoint_variables,
            uninitialized_graph_variables,
        })
    }

    /// Whether every graph variable is restored
    pub fn is_complete(&self) -> bool {
        self.uninitialized_graph_variables.is_empty()
    }
}
