//! The storage seam the checkpoint resolver reads model directories through

use async_trait::async_trait;
use bytes::Bytes;
use runtime_core::Result;

/// Async access to a model directory
///
/// Paths are relative to the backend root. The resolver only reads; writes
/// exist for tools and tests that lay out checkpoints.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Full contents of `path`
    ///
    /// # Errors
    /// `StoragePathNotFound` when nothing exists at `path`
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Replace the contents of `path`, creating parent directories
    ///
    /// Readers never observe a partially written file. Returns the number
    /// of bytes written.
    async fn write(&self, path: &str, data: Bytes) -> Result<u64>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Sorted files directly inside `dir` (`""` is the root), relative to the root
    ///
    /// # Errors
    /// `StoragePathNotFound` when `dir` is missing, so a poller notices a
    /// model directory that disappeared.
    async fn list(&self, dir: &str) -> Result<Vec<String>>;
}
