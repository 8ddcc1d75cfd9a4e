//! Error types for checkpoint resolution and variable remapping

use thiserror::Error;

/// Result type alias using the runtime Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type shared by every crate in the workspace
#[derive(Error, Debug)]
pub enum Error {
    // Checkpoint resolution errors
    #[error("Checkpoint not found: requested {requested} in {model_dir}")]
    CheckpointNotFound { requested: String, model_dir: String },

    #[error("Malformed checkpoint identifier: {identifier}")]
    MalformedIdentifier { identifier: String },

    // Remapping errors
    #[error(
        "Structural mismatch in {scope}: checkpoint has {source_slots} block/layer slots, \
         graph has {target_slots} after removing new layers"
    )]
    StructuralMismatch {
        scope: String,
        source_slots: usize,
        target_slots: usize,
    },

    #[error("Variable is not restorable from checkpoint: {variable}")]
    NotRestorable { variable: String },

    #[error("Ambiguous correspondence for {target}: matched both {first} and {second}")]
    AmbiguousCorrespondence {
        target: String,
        first: String,
        second: String,
    },

    // Storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Storage path not found: {path}")]
    StoragePathNotFound { path: String },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage { .. } | Error::Io(_))
    }

    /// Returns true if this error indicates a fatal condition
    ///
    /// Fatal errors are raised while building the restore mapping and must
    /// abort initialization before any variable is restored.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::StructuralMismatch { .. }
                | Error::NotRestorable { .. }
                | Error::AmbiguousCorrespondence { .. }
                | Error::InvalidConfig { .. }
                | Error::Internal { .. }
        )
    }

    /// Returns a retry delay hint in milliseconds, if applicable
    pub fn retry_delay_hint_ms(&self) -> Option<u64> {
        match self {
            Error::Storage { .. } => Some(100),
            Error::Io(_) => Some(100),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
