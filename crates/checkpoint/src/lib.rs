//! Checkpoint discovery for training and evaluation loops
//!
//! Turns an abstract [`StepSelector`](runtime_core::StepSelector) into the
//! concrete `model.ckpt-<step>` checkpoints present in a model directory,
//! including a polling watcher that waits for new checkpoints to be written.

pub mod codec;
pub mod manifest;
pub mod resolver;
pub mod variables;
pub mod watcher;

pub use codec::{checkpoint_path, format_step, index_file, parse_step, CHECKPOINT_STEM, INDEX_SUFFIX};
pub use manifest::{CheckpointState, MANIFEST_FILE};
pub use resolver::{CheckpointResolver, Resolution, ResolverConfig};
pub use variables::{InMemoryVariableSource, SidecarVariableSource, VariableIndex, VariableSource};
pub use watcher::CheckpointWatcher;
