//! Storage - Pluggable storage backends for checkpoint directories
//!
//! The checkpoint resolver only ever reads from storage: it lists the model
//! directory, checks whether checkpoint files exist and reads small metadata
//! files (the checkpoint manifest and variable indexes). Writes are supported
//! so that tools and tests can lay out a directory atomically.
//!
//! # Example
//!
//! ```no_run
//! use storage::{StorageBackend, LocalStorage};
//!
//! # async fn example() -> runtime_core::Result<()> {
//! let storage = LocalStorage::new("/tmp/model");
//! let entries = storage.list("").await?;
//! let manifest = storage.read("checkpoint").await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod local;

pub use backend::StorageBackend;
pub use local::LocalStorage;
