//! Restore strategies: which graph variables to load and from where

use std::fmt;

use runtime_core::{Error, Result};

use crate::index::RemappingIndex;

/// Decides, per graph variable, whether and from which checkpoint variable
/// it is restored
pub trait RestoreStrategy: Send + Sync {
    fn should_restore(&self, target: &str) -> bool;

    /// Checkpoint variable name for `target`
    ///
    /// Fails with [`Error::NotRestorable`] when `should_restore` is false.
    fn source_name(&self, target: &str) -> Result<String>;
}

type Filter = Box<dyn Fn(&str) -> bool + Send + Sync>;
type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Caller-supplied predicate and name lookup
///
/// Without a filter every variable is restored; without a lookup every
/// variable is loaded under its own name.
#[derive(Default)]
pub struct CustomMapping {
    filter: Option<Filter>,
    lookup: Option<Lookup>,
}

impl CustomMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.lookup = Some(Box::new(lookup));
        self
    }
}

impl fmt::Debug for CustomMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMapping")
            .field("filter", &self.filter.is_some())
            .field("lookup", &self.lookup.is_some())
            .finish()
    }
}

impl RestoreStrategy for CustomMapping {
    fn should_restore(&self, target: &str) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(target))
    }

    fn source_name(&self, target: &str) -> Result<String> {
        let not_restorable = || Error::NotRestorable {
            variable: target.to_string(),
        };

        if !self.should_restore(target) {
            return Err(not_restorable());
        }
        match &self.lookup {
            Some(lookup) => lookup(target).ok_or_else(not_restorable),
            None => Ok(target.to_string()),
        }
    }
}

/// Restore strategy selected at construction
#[derive(Debug)]
pub enum VariableMapping {
    /// Every variable restored under its own name
    Identity,

    /// Positional remapping across architectures
    Remapped(RemappingIndex),

    Custom(CustomMapping),
}

impl RestoreStrategy for VariableMapping {
    fn should_restore(&self, target: &str) -> bool {
        match self {
            VariableMapping::Identity => true,
            VariableMapping::Remapped(index) => index.is_restorable(target),
            VariableMapping::Custom(custom) => custom.should_restore(target),
        }
    }

    fn source_name(&self, target: &str) -> Result<String> {
        match self {
            VariableMapping::Identity => Ok(target.to_string()),
            VariableMapping::Remapped(index) => index.source_for(target).map(str::to_string),
            VariableMapping::Custom(custom) => custom.source_name(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime_core::{AmbiguityPolicy, NewLayerSpec};

    #[test]
    fn test_identity() {
        let mapping = VariableMapping::Identity;
        assert!(mapping.should_restore("anything/at/all"));
        assert_eq!(mapping.source_name("decoder/layer_000/w").unwrap(), "decoder/layer_000/w");
    }

    #[test]
    fn test_remapped() {
        let index = RemappingIndex::infer(
            &["decoder/layer_000/w"],
            &["decoder/layer_000/w", "decoder/layer_001/w"],
            &NewLayerSpec::single([0]),
            AmbiguityPolicy::Reject,
        )
        .unwrap();
        let mapping = VariableMapping::Remapped(index);

        assert!(!mapping.should_restore("decoder/layer_000/w"));
        assert_eq!(mapping.source_name("decoder/layer_001/w").unwrap(), "decoder/layer_000/w");
        assert!(matches!(
            mapping.source_name("decoder/layer_000/w"),
            Err(Error::NotRestorable { .. })
        ));
    }

    #[test]
    fn test_custom() {
        let custom = CustomMapping::new()
            .with_filter(|name| !name.starts_with("optimizer/"))
            .with_lookup(|name| name.strip_prefix("finetune/").map(|rest| format!("base/{}", rest)));
        let mapping = VariableMapping::Custom(custom);

        assert!(!mapping.should_restore("optimizer/beta1"));
        assert!(mapping.source_name("optimizer/beta1").is_err());
        assert_eq!(mapping.source_name("finetune/dense/w").unwrap(), "base/dense/w");
        assert!(mapping.source_name("other/w").is_err());
    }

    #[test]
    fn test_custom_defaults_to_identity() {
        let custom = CustomMapping::new();
        assert!(custom.should_restore("w"));
        assert_eq!(custom.source_name("w").unwrap(), "w");
        assert_eq!(format!("{:?}", custom), "CustomMapping { filter: false, lookup: false }");
    }
}
