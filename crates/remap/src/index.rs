//! Target-to-source variable index for one checkpoint/graph pair

use std::collections::btree_map::{self, BTreeMap};

use runtime_core::{AmbiguityPolicy, Error, NewLayerSpec, Result};
use tracing::{info, warn};

use crate::correspondence::Correspondence;
use crate::matcher::{ParsedName, VariableMatcher};
use crate::structure::ModelStructure;

/// Which checkpoint variable initializes each restorable graph variable
///
/// Built once by matching every checkpoint name against every graph name,
/// immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemappingIndex {
    mapping: BTreeMap<String, String>,
}

impl RemappingIndex {
    /// Infer both structures, build their correspondence and index the names
    pub fn infer<S, T>(
        sources: &[S],
        targets: &[T],
        new_layers: &NewLayerSpec,
        policy: AmbiguityPolicy,
    ) -> Result<Self>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let source_structure = ModelStructure::infer(sources);
        let target_structure = ModelStructure::infer(targets);
        let correspondence =
            Correspondence::build(&source_structure, &target_structure, new_layers)?;
        Self::build(sources, targets, &correspondence, policy)
    }

    /// Index the names through a [`VariableMatcher`] over `correspondence`
    pub fn build<S, T>(
        sources: &[S],
        targets: &[T],
        correspondence: &Correspondence,
        policy: AmbiguityPolicy,
    ) -> Result<Self>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let matcher = VariableMatcher::new(correspondence);
        let sources: Vec<ParsedName<'_>> = sources.iter().map(|s| ParsedName::new(s.as_ref())).collect();
        let targets: Vec<ParsedName<'_>> = targets.iter().map(|t| ParsedName::new(t.as_ref())).collect();

        let mut mapping = BTreeMap::new();
        for source in &sources {
            for target in &targets {
                if matcher.matches_parsed(source, target) {
                    record(&mut mapping, source.name, target.name, policy)?;
                }
            }
        }

        info!(
            sources = sources.len(),
            targets = targets.len(),
            restorable = mapping.len(),
            "Built remapping index"
        );
        Ok(Self { mapping })
    }

    /// Index the names with an arbitrary match predicate
    pub fn build_with<S, T, F>(
        sources: &[S],
        targets: &[T],
        policy: AmbiguityPolicy,
        mut matches: F,
    ) -> Result<Self>
    where
        S: AsRef<str>,
        T: AsRef<str>,
        F: FnMut(&str, &str) -> bool,
    {
        let mut mapping = BTreeMap::new();
        for source in sources.iter().map(AsRef::as_ref) {
            for target in targets.iter().map(AsRef::as_ref) {
                if matches(source, target) {
                    record(&mut mapping, source, target, policy)?;
                }
            }
        }
        Ok(Self { mapping })
    }

    pub fn is_restorable(&self, target: &str) -> bool {
        self.mapping.contains_key(target)
    }

    /// Checkpoint variable that initializes `target`
    pub fn source_for(&self, target: &str) -> Result<&str> {
        self.mapping
            .get(target)
            .map(String::as_str)
            .ok_or_else(|| Error::NotRestorable {
                variable: target.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// `(target, source)` pairs in target order
    pub fn iter(&self) -> Assignments<'_> {
        Assignments {
            inner: self.mapping.iter(),
        }
    }
}

fn record(
    mapping: &mut BTreeMap<String, String>,
    source: &str,
    target: &str,
    policy: AmbiguityPolicy,
) -> Result<()> {
    match mapping.get(target) {
        Some(first) if first != source => match policy {
            AmbiguityPolicy::Reject => {
                return Err(Error::AmbiguousCorrespondence {
                    target: target.to_string(),
                    first: first.clone(),
                    second: source.to_string(),
                })
            }
            AmbiguityPolicy::LastWins => {
                warn!(
                    variable = target,
                    replaced = %first,
                    source,
                    "Graph variable matched by several checkpoint variables"
                );
            }
        },
        _ => {}
    }
    mapping.insert(target.to_string(), source.to_string());
    Ok(())
}

/// Iterator over the `(target, source)` pairs of a [`RemappingIndex`]
pub struct Assignments<'a> {
    inner: btree_map::Iter<'a, String, String>,
}

impl<'a> Iterator for Assignments<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(target, source)| (target.as_str(), source.as_str()))
    }
}

impl<'a> IntoIterator for &'a RemappingIndex {
    type Item = (&'a str, &'a str);
    type IntoIter = Assignments<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
