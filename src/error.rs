//! Error types for the restore engine and its collaborators.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by object store adapters.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("object store request failed for {bucket}/{key}: {message}")]
    Request {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("operation not supported by {backend} backend: {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("object store configuration error: {0}")]
    Config(String),
}

/// Errors surfaced by a restore run.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        path: PathBuf,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer of {key} failed: {message}")]
    Transfer { key: String, message: String },

    #[error("invalid index: {0}")]
    InvalidIndex(String),

    #[error("index serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("restore cancelled")]
    Cancelled,

    #[error("restore task failed: {0}")]
    TaskFailed(String),
}

impl RestoreError {
    /// Wrap an I/O error with the path and operation that produced it.
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RestoreError::Io {
            path: path.into(),
            op,
            source,
        }
    }
}

impl From<StorageError> for RestoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { bucket, key } => RestoreError::ObjectNotFound { bucket, key },
            StorageError::Request { key, message, .. } => RestoreError::Transfer { key, message },
            StorageError::Unsupported { .. } => RestoreError::Transfer {
                key: String::new(),
                message: err.to_string(),
            },
            StorageError::Config(msg) => RestoreError::Config(msg),
        }
    }
}

impl From<config::ConfigError> for RestoreError {
    fn from(err: config::ConfigError) -> Self {
        RestoreError::Config(err.to_string())
    }
}
