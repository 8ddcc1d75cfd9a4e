//! Variable remapping between a checkpoint and a structurally different graph
//!
//! A checkpoint written by one architecture can initialize another as long as
//! both follow the `block_NNN/layer_NNN` naming convention:
//! - **Structure inference** counts blocks and layers per sub-tree
//! - **Correspondence** pairs checkpoint block/layer slots with graph slots
//!   positionally, skipping layers that are new in the graph
//! - **Matching** decides whether two concrete names are the same parameter
//! - **Remapping index** records, for every graph variable, its checkpoint source
//!
//! # Example
//!
//! ```rust
//! use remap::{RemappingIndex, RestoreStrategy, VariableMapping};
//! use runtime_core::{AmbiguityPolicy, NewLayerSpec};
//!
//! let checkpoint = ["global_step", "decoder/block_000/layer_000/w"];
//! let graph = [
//!     "global_step",
//!     "decoder/block_000/layer_000/w",
//!     "decoder/block_000/layer_001/w",
//! ];
//! let index = RemappingIndex::infer(
//!     &checkpoint,
//!     &graph,
//!     &NewLayerSpec::single([1]),
//!     AmbiguityPolicy::Reject,
//! )
//! .unwrap();
//!
//! let mapping = VariableMapping::Remapped(index);
//! assert!(mapping.should_restore("decoder/block_000/layer_000/w"));
//! assert!(!mapping.should_restore("decoder/block_000/layer_001/w"));
//! ```

mod correspondence;
mod index;
mod matcher;
mod plan;
mod strategy;
mod structure;

pub use correspondence::{Correspondence, CorrespondenceEntry, GroupKey};
pub use index::{Assignments, RemappingIndex};
pub use matcher::{leaf_name, GroupedName, VariableMatcher};
pub use plan::RestorePlan;
pub use strategy::{CustomMapping, RestoreStrategy, VariableMapping};
pub use structure::{BlockLayerCount, ModelStructure, SubTree};
