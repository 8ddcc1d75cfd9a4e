//! Local filesystem storage backend
//!
//! Model directories are usually written by another process (the trainer)
//! while being observed here, so listings hide in-flight temp files and
//! writes from this side go through a rename.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use runtime_core::{Error, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::StorageBackend;

/// Map an I/O failure on `path` to a storage error
fn io_error(action: &str, path: &Path, err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::StoragePathNotFound {
            path: path.display().to_string(),
        }
    } else {
        Error::Storage {
            message: format!("Failed to {} {}: {}", action, path.display(), err),
        }
    }
}

/// Model directory on the local filesystem
///
/// - Writes land in a hidden `.name.<uuid>.tmp` sibling and are renamed into place
/// - Listings are flat, sorted, and skip hidden entries and sub-directories
/// - Symlinked checkpoint files are listed like regular files
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Directory all relative paths are resolved against
    pub fn base_path(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }

    async fn write_atomically(&self, target: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create directory", parent, e))?;
        }

        let temp = target.with_file_name(format!(
            ".{}.{}.tmp",
            target.file_name().unwrap_or_default().to_string_lossy(),
            Uuid::new_v4()
        ));

        let written = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            fs::rename(&temp, target).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp).await {
                warn!(temp = %temp.display(), error = %cleanup, "Failed to remove temp file");
            }
            return Err(io_error("write", target, e));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    #[instrument(skip(self), fields(backend = "local"))]
    async fn read(&self, path: &str) -> Result<Bytes> {
        let full_path = self.full_path(path);
        let data = fs::read(&full_path)
            .await
            .map_err(|e| io_error("read", &full_path, e))?;
        debug!(size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self, data), fields(backend = "local", size = data.len()))]
    async fn write(&self, path: &str, data: Bytes) -> Result<u64> {
        self.write_atomically(&self.full_path(path), &data).await?;
        Ok(data.len() as u64)
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn exists(&self, path: &str) -> Result<bool> {
        match fs::metadata(self.full_path(path)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("stat", &self.full_path(path), e)),
        }
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let dir_path = self.full_path(dir);
        let mut entries = fs::read_dir(&dir_path)
            .await
            .map_err(|e| io_error("list", &dir_path, e))?;

        let prefix = match dir.trim_end_matches('/') {
            "" => String::new(),
            trimmed => format!("{}/", trimmed),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("list", &dir_path, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }

            // Follows symlinks; entries removed mid-listing are skipped
            match fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_file() => names.push(format!("{}{}", prefix, name)),
                _ => continue,
            }
        }

        names.sort();
        debug!(count = names.len(), "Listed directory");
        Ok(names)
    }
}
