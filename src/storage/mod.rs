//! Object Store Client
//!
//! Capability trait for the remote bucket/key store holding index documents
//! and content chunks. The restore engine only ever calls
//! [`ObjectStoreClient::get_object`]; the rest of the surface is used by the
//! index cache and tooling.

pub mod backend;

use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

pub use backend::ObjectStoreBackend;

/// Default lifetime of presigned download URLs.
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(15 * 60);

/// Key of the index document for a snapshot.
pub fn index_key(snapshot_id: &str) -> String {
    format!("{}/index.json", snapshot_id)
}

#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Fetch the full object body.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError>;

    /// Store an object, replacing any previous body.
    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), StorageError>;

    /// Whether the object exists.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, StorageError>;

    /// Time-limited URL for downloading the object without credentials.
    async fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError>;
}
