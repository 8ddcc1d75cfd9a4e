//! Checkpoint restore planning
//!
//! Ties the pieces together for a training or evaluation loop:
//! - **Resolution**: picks the checkpoint(s) a step selector refers to,
//!   or waits for new ones
//! - **Variable listing**: reads the variable names stored in a checkpoint
//! - **Remapping**: decides which graph variables each checkpoint initializes
//!
//! # Example
//!
//! ```ignore
//! use restore::RestoreService;
//! use runtime_core::RestoreConfig;
//!
//! #[tokio::main]
//! async fn main() -> runtime_core::Result<()> {
//!     let config = RestoreConfig::from_json_file("restore.json")?;
//!     let service = RestoreService::new(config)?;
//!     let graph = ["global_step", "decoder/layer_000/w"];
//!     for (checkpoint, plan) in service.plan_all(&service.config().checkpoint.selector, &graph).await? {
//!         println!("{}: {} restored", checkpoint, plan.assignments.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod service;

pub use service::RestoreService;
