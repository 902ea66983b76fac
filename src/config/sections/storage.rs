//! Object store connection settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which object store implementation backs the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    S3,
    /// Buckets are sub-directories of `root` on the local filesystem.
    Local,
    /// Process-local in-memory buckets (tests and dry runs).
    Memory,
}

fn default_backend() -> BackendKind {
    BackendKind::S3
}

fn default_timeout_secs() -> u64 {
    30
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Bucket holding index documents and chunks.
    #[serde(default)]
    pub bucket: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Falls back to the AWS_* environment when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,

    /// Root directory for the local backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.bucket.trim().is_empty() {
            return Err("storage.bucket must be set".to_string());
        }
        if self.bucket.contains('/') {
            return Err(format!(
                "storage.bucket must not contain '/': {}",
                self.bucket
            ));
        }
        match self.backend {
            BackendKind::S3 => {
                if self.region.as_deref().map_or(true, |r| r.trim().is_empty()) {
                    return Err("storage.region is required for the s3 backend".to_string());
                }
            }
            BackendKind::Local => {
                if self.root.is_none() {
                    return Err("storage.root is required for the local backend".to_string());
                }
            }
            BackendKind::Memory => {}
        }
        if self.timeout_secs == 0 {
            return Err("storage.timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            bucket: String::new(),
            region: None,
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            root: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}
