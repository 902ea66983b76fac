//! `object_store`-backed implementation of [`ObjectStoreClient`].
//!
//! One underlying store is built lazily per bucket and reused for the life of
//! the backend.

use super::ObjectStoreClient;
use crate::config::{BackendKind, StorageConfig};
use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{ClientOptions, ObjectStore, PutPayload};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Clone)]
enum BucketStore {
    /// Kept concrete so presigning stays available.
    S3(Arc<AmazonS3>),
    Dyn(Arc<dyn ObjectStore>),
}

impl BucketStore {
    fn as_store(&self) -> &dyn ObjectStore {
        match self {
            BucketStore::S3(s3) => s3.as_ref(),
            BucketStore::Dyn(store) => store.as_ref(),
        }
    }
}

pub struct ObjectStoreBackend {
    config: StorageConfig,
    buckets: RwLock<HashMap<String, BucketStore>>,
}

impl ObjectStoreBackend {
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        if config.backend == BackendKind::Local && config.root.is_none() {
            return Err(StorageError::Config(
                "storage.root is required for the local backend".to_string(),
            ));
        }
        info!(
            backend = ?config.backend,
            bucket = %config.bucket,
            region = config.region.as_deref().unwrap_or(""),
            "Object store configured"
        );
        Ok(Self {
            config: config.clone(),
            buckets: RwLock::new(HashMap::new()),
        })
    }

    /// In-memory backend; buckets spring into existence on first use.
    pub fn in_memory() -> Self {
        Self {
            config: StorageConfig {
                backend: BackendKind::Memory,
                ..StorageConfig::default()
            },
            buckets: RwLock::new(HashMap::new()),
        }
    }

    fn backend_name(&self) -> &'static str {
        match self.config.backend {
            BackendKind::S3 => "s3",
            BackendKind::Local => "local",
            BackendKind::Memory => "memory",
        }
    }

    fn bucket(&self, bucket: &str) -> Result<BucketStore, StorageError> {
        if let Some(store) = self.buckets.read().get(bucket) {
            return Ok(store.clone());
        }
        let mut buckets = self.buckets.write();
        // Another caller may have built it while we waited for the lock.
        if let Some(store) = buckets.get(bucket) {
            return Ok(store.clone());
        }
        let store = self.build(bucket)?;
        buckets.insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    fn build(&self, bucket: &str) -> Result<BucketStore, StorageError> {
        if bucket.is_empty() || bucket.contains('/') {
            return Err(StorageError::Config(format!("invalid bucket name '{}'", bucket)));
        }
        match self.config.backend {
            BackendKind::S3 => {
                let client_options = ClientOptions::new()
                    .with_timeout(Duration::from_secs(self.config.timeout_secs));
                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_client_options(client_options);
                if let Some(region) = &self.config.region {
                    builder = builder.with_region(region);
                }
                if let Some(key) = &self.config.access_key_id {
                    builder = builder.with_access_key_id(key);
                }
                if let Some(secret) = &self.config.secret_access_key {
                    builder = builder.with_secret_access_key(secret);
                }
                if let Some(endpoint) = &self.config.endpoint {
                    builder = builder
                        .with_allow_http(endpoint.starts_with("http://"))
                        .with_endpoint(endpoint);
                }
                let s3 = builder
                    .build()
                    .map_err(|e| StorageError::Config(format!("Failed to build S3 client: {}", e)))?;
                debug!(bucket, "S3 client built");
                Ok(BucketStore::S3(Arc::new(s3)))
            }
            BackendKind::Local => {
                let root = self.config.root.as_ref().ok_or_else(|| {
                    StorageError::Config("storage.root is required for the local backend".to_string())
                })?;
                let dir = root.join(bucket);
                std::fs::create_dir_all(&dir).map_err(|e| {
                    StorageError::Config(format!("Failed to create bucket directory {:?}: {}", dir, e))
                })?;
                let local = LocalFileSystem::new_with_prefix(&dir).map_err(|e| {
                    StorageError::Config(format!("Failed to create local store: {}", e))
                })?;
                debug!(bucket, path = %dir.display(), "Local store opened");
                Ok(BucketStore::Dyn(Arc::new(local)))
            }
            BackendKind::Memory => Ok(BucketStore::Dyn(Arc::new(InMemory::new()))),
        }
    }
}

fn object_path(bucket: &str, key: &str) -> Result<ObjectPath, StorageError> {
    ObjectPath::parse(key).map_err(|e| StorageError::Request {
        bucket: bucket.to_string(),
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn map_error(bucket: &str, key: &str, err: object_store::Error) -> StorageError {
    match err {
        object_store::Error::NotFound { .. } => StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        other => StorageError::Request {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl ObjectStoreClient for ObjectStoreBackend {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let store = self.bucket(bucket)?;
        let path = object_path(bucket, key)?;
        let result = store
            .as_store()
            .get(&path)
            .await
            .map_err(|e| map_error(bucket, key, e))?;
        let bytes = result.bytes().await.map_err(|e| map_error(bucket, key, e))?;
        debug!(bucket, key, size = bytes.len(), "Object fetched");
        Ok(bytes)
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), StorageError> {
        let store = self.bucket(bucket)?;
        let path = object_path(bucket, key)?;
        let size = data.len();
        store
            .as_store()
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|e| map_error(bucket, key, e))?;
        debug!(bucket, key, size, "Object stored");
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, StorageError> {
        let store = self.bucket(bucket)?;
        let path = object_path(bucket, key)?;
        match store.as_store().head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(map_error(bucket, key, e)),
        }
    }

    async fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let BucketStore::S3(s3) = self.bucket(bucket)? else {
            return Err(StorageError::Unsupported {
                backend: self.backend_name(),
                operation: "presigned_url",
            });
        };
        let path = object_path(bucket, key)?;
        let url = s3
            .signed_url(http::Method::GET, &path, expires_in)
            .await
            .map_err(|e| map_error(bucket, key, e))?;
        Ok(url.to_string())
    }
}
