//! Runtime Core - Foundation for checkpoint restoration
//!
//! Provides the shared types, error taxonomy and configuration used by the
//! checkpoint resolver, the variable remapping engine and the restore service.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AmbiguityPolicy, CheckpointConfig, MappingMode, RemapConfig, RestoreConfig};
pub use error::{Error, Result};
pub use types::*;
