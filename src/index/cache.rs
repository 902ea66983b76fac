//! Local index cache
//!
//! Index documents are immutable once a snapshot is taken, so a copy on local
//! disk is authoritative for that snapshot. Layout under the cache root:
//!
//! ```text
//! <root>/<snapshot_id>/index.json
//! <root>/<snapshot_id>/tmp/        staging area for atomic writes
//! ```

use super::Index;
use crate::error::RestoreError;
use crate::storage::{index_key, ObjectStoreClient};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const INDEX_FILE: &str = "index.json";
const STAGING_DIR: &str = "tmp";

/// Anything able to produce the index for a snapshot.
#[async_trait]
pub trait IndexSource: Send + Sync {
    async fn load_index(&self, snapshot_id: &str) -> Result<Index, RestoreError>;
}

/// Read-through cache in front of the object store copy of each index.
pub struct IndexCache {
    root: PathBuf,
    bucket: String,
    store: Arc<dyn ObjectStoreClient>,
}

impl IndexCache {
    pub fn new(
        root: impl Into<PathBuf>,
        bucket: impl Into<String>,
        store: Arc<dyn ObjectStoreClient>,
    ) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
            store,
        }
    }

    /// Location of the cached index for `snapshot_id`.
    pub fn index_path(&self, snapshot_id: &str) -> Result<PathBuf, RestoreError> {
        check_snapshot_id(snapshot_id)?;
        Ok(self.root.join(snapshot_id).join(INDEX_FILE))
    }

    /// Serialize `index` into the cache, replacing any previous copy.
    pub async fn save_index(&self, index: &Index) -> Result<PathBuf, RestoreError> {
        let bytes = index.to_json()?;
        self.persist(&index.recovery_point_id, bytes).await
    }

    async fn persist(&self, snapshot_id: &str, bytes: Vec<u8>) -> Result<PathBuf, RestoreError> {
        let target = self.index_path(snapshot_id)?;
        let staging = self.root.join(snapshot_id).join(STAGING_DIR);
        let dest = target.clone();
        tokio::task::spawn_blocking(move || write_atomic(&staging, &dest, &bytes))
            .await
            .map_err(|e| RestoreError::TaskFailed(e.to_string()))??;
        debug!(path = %target.display(), "Index cached");
        Ok(target)
    }
}

#[async_trait]
impl IndexSource for IndexCache {
    async fn load_index(&self, snapshot_id: &str) -> Result<Index, RestoreError> {
        let path = self.index_path(snapshot_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(snapshot_id, path = %path.display(), "Index cache hit");
                return Index::from_json(&bytes);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RestoreError::io("read cached index", path, e)),
        }

        let key = index_key(snapshot_id);
        info!(snapshot_id, bucket = %self.bucket, key = %key, "Fetching index from object store");
        let bytes = self.store.get_object(&self.bucket, &key).await?;
        // Only documents that parse and validate are kept.
        let index = Index::from_json(&bytes)?;
        self.persist(snapshot_id, bytes.to_vec()).await?;
        Ok(index)
    }
}

fn check_snapshot_id(snapshot_id: &str) -> Result<(), RestoreError> {
    if snapshot_id.is_empty()
        || snapshot_id == "."
        || snapshot_id.contains("..")
        || snapshot_id.contains('/')
        || snapshot_id.contains('\\')
    {
        return Err(RestoreError::InvalidIndex(format!(
            "invalid snapshot id '{}'",
            snapshot_id
        )));
    }
    Ok(())
}

fn write_atomic(staging: &Path, target: &Path, bytes: &[u8]) -> Result<(), RestoreError> {
    create_private_dir(staging)?;
    let mut tmp = tempfile::NamedTempFile::new_in(staging)
        .map_err(|e| RestoreError::io("create staging file", staging, e))?;
    tmp.write_all(bytes)
        .map_err(|e| RestoreError::io("write staging file", tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| RestoreError::io("sync staging file", tmp.path(), e))?;
    tmp.persist(target)
        .map_err(|e| RestoreError::io("rename cached index", target, e.error))?;
    Ok(())
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> Result<(), RestoreError> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(|e| RestoreError::io("create cache directory", dir, e))
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> Result<(), RestoreError> {
    std::fs::create_dir_all(dir).map_err(|e| RestoreError::io("create cache directory", dir, e))
}
