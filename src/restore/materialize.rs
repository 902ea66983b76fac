//! Materializer
//!
//! Carries out a [`Decision`] for one node: creates directories, symlinks and
//! files, rebuilds file bytes from chunks with positional writes, and applies
//! mode, owner and timestamps. Filesystem calls run on the blocking pool.

use super::blocking;
use super::reconcile::Decision;
use crate::error::RestoreError;
use crate::index::{ChunkRef, Node, NodeKind};
use crate::platform::{fs, LocalMetadata, MetadataAccessor};
use crate::storage::ObjectStoreClient;
use chrono::{DateTime, FixedOffset};
use futures::stream::{self, StreamExt};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Parent directories created for restored files.
const PRIVATE_DIR_MODE: u32 = 0o700;

/// What applying one decision produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub bytes_written: u64,
    /// Set when a symlink could not be created; the run carries on.
    pub symlink_failure: Option<String>,
}

/// Metadata applied to an entry, detached from the node so it can move onto
/// the blocking pool cheaply.
#[derive(Debug, Clone, Copy)]
struct Attrs {
    mode: u32,
    uid: u32,
    gid: u32,
    access_time: DateTime<FixedOffset>,
    mod_time: DateTime<FixedOffset>,
}

impl Attrs {
    fn of(node: &Node) -> Self {
        Self {
            mode: node.permissions(),
            uid: node.uid,
            gid: node.gid,
            access_time: node.access_time,
            mod_time: node.mod_time,
        }
    }
}

pub struct Materializer {
    store: Arc<dyn ObjectStoreClient>,
    accessor: Arc<dyn MetadataAccessor>,
    bucket: String,
    chunk_fetch_concurrency: usize,
}

impl Materializer {
    pub fn new(
        store: Arc<dyn ObjectStoreClient>,
        accessor: Arc<dyn MetadataAccessor>,
        bucket: impl Into<String>,
        chunk_fetch_concurrency: usize,
    ) -> Self {
        Self {
            store,
            accessor,
            bucket: bucket.into(),
            chunk_fetch_concurrency: chunk_fetch_concurrency.max(1),
        }
    }

    pub async fn apply(
        &self,
        node: &Node,
        path: &Path,
        decision: Decision,
        local: Option<&LocalMetadata>,
        cancel: &CancellationToken,
    ) -> Result<Outcome, RestoreError> {
        match decision {
            Decision::Skip => Ok(Outcome::default()),
            Decision::Create => self.create(node, path, cancel).await,
            Decision::RecreateContent if matches!(node.kind, NodeKind::File { .. }) => {
                if let Some(local) = local {
                    let kind = local.kind;
                    let target = path.to_path_buf();
                    blocking(move || {
                        fs::remove_entry(&target, kind)
                            .map_err(|e| RestoreError::io("remove", &target, e))
                    })
                    .await?;
                }
                self.create(node, path, cancel).await
            }
            Decision::RecreateContent | Decision::UpdateMetadataOnly => {
                self.update_metadata(node, path).await?;
                Ok(Outcome::default())
            }
        }
    }

    async fn create(
        &self,
        node: &Node,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Outcome, RestoreError> {
        let attrs = Attrs::of(node);
        let accessor = Arc::clone(&self.accessor);
        let target = path.to_path_buf();
        match &node.kind {
            NodeKind::Directory => {
                blocking(move || create_directory(accessor.as_ref(), &target, attrs)).await?;
                Ok(Outcome::default())
            }
            NodeKind::Symlink { link_target } => {
                let link_target = link_target.clone();
                let failure = blocking(move || {
                    create_symlink(accessor.as_ref(), &link_target, &target, attrs)
                })
                .await?;
                Ok(Outcome {
                    bytes_written: 0,
                    symlink_failure: failure,
                })
            }
            NodeKind::File { content } => {
                let file =
                    blocking(move || create_file(accessor.as_ref(), &target, attrs)).await?;
                let bytes_written = self.write_content(Arc::new(file), path, content, cancel).await?;

                let accessor = Arc::clone(&self.accessor);
                let target = path.to_path_buf();
                blocking(move || apply_attrs(accessor.as_ref(), &target, attrs, true)).await?;
                Ok(Outcome {
                    bytes_written,
                    symlink_failure: None,
                })
            }
        }
    }

    /// Fetch every chunk and write it at its offset. Fetches may run ahead of
    /// the writes up to the configured concurrency; writes follow list order.
    async fn write_content(
        &self,
        file: Arc<File>,
        path: &Path,
        chunks: &[ChunkRef],
        cancel: &CancellationToken,
    ) -> Result<u64, RestoreError> {
        let store = Arc::clone(&self.store);
        let bucket = self.bucket.clone();
        let stop = cancel.clone();
        let mut fetches = stream::iter(chunks.to_vec())
            .map(move |chunk| {
                let store = Arc::clone(&store);
                let bucket = bucket.clone();
                let stop = stop.clone();
                async move {
                    let data = tokio::select! {
                        biased;
                        _ = stop.cancelled() => return Err(RestoreError::Cancelled),
                        fetched = store.get_object(&bucket, &chunk.etag) => fetched?,
                    };
                    Ok::<_, RestoreError>((chunk, data))
                }
            })
            .buffered(self.chunk_fetch_concurrency)
            .boxed();

        let mut written = 0u64;
        while let Some(fetched) = fetches.next().await {
            let (chunk, data) = fetched?;
            let offset = chunk.start;
            let size = data.len() as u64;
            let file = Arc::clone(&file);
            let target = path.to_path_buf();
            blocking(move || {
                fs::write_at(&file, offset, &data).map_err(|e| RestoreError::io("write chunk to", &target, e))
            })
            .await?;
            debug!(
                path = %path.display(),
                key = %chunk.etag,
                offset,
                size,
                "Chunk written"
            );
            written += size;
        }
        Ok(written)
    }

    async fn update_metadata(&self, node: &Node, path: &Path) -> Result<(), RestoreError> {
        let attrs = Attrs::of(node);
        let accessor = Arc::clone(&self.accessor);
        let target = path.to_path_buf();
        let is_symlink = matches!(node.kind, NodeKind::Symlink { .. });
        blocking(move || {
            if is_symlink {
                // The link target itself is left as found.
                set_owner_best_effort(accessor.as_ref(), &target, attrs);
                fs::apply_symlink_mode(&target, attrs.mode)
                    .map_err(|e| RestoreError::io("set mode of", &target, e))
            } else {
                apply_attrs(accessor.as_ref(), &target, attrs, true)
            }
        })
        .await
    }
}

fn create_directory(
    accessor: &dyn MetadataAccessor,
    path: &Path,
    attrs: Attrs,
) -> Result<(), RestoreError> {
    fs::create_dir_chain(path, None).map_err(|e| RestoreError::io("create directory", path, e))?;
    apply_attrs(accessor, path, attrs, true)
}

/// Returns a description of the failure instead of an error when the link
/// cannot be created.
fn create_symlink(
    accessor: &dyn MetadataAccessor,
    link_target: &Path,
    path: &Path,
    attrs: Attrs,
) -> Result<Option<String>, RestoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_chain(parent, None)
            .map_err(|e| RestoreError::io("create parent directory", parent, e))?;
    }
    if let Err(e) = fs::create_symlink(link_target, path) {
        warn!(
            path = %path.display(),
            target = %link_target.display(),
            error = %e,
            "Failed to create symlink"
        );
        return Ok(Some(format!("{}: {}", path.display(), e)));
    }
    set_owner_best_effort(accessor, path, attrs);
    if let Err(e) = fs::apply_symlink_mode(path, attrs.mode) {
        warn!(path = %path.display(), error = %e, "Failed to set symlink mode");
    }
    Ok(None)
}

fn create_file(
    accessor: &dyn MetadataAccessor,
    path: &Path,
    attrs: Attrs,
) -> Result<File, RestoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_chain(parent, Some(PRIVATE_DIR_MODE))
            .map_err(|e| RestoreError::io("create parent directory", parent, e))?;
    }
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| RestoreError::io("create file", path, e))?;
    apply_attrs(accessor, path, attrs, false)?;
    Ok(file)
}

fn apply_attrs(
    accessor: &dyn MetadataAccessor,
    path: &Path,
    attrs: Attrs,
    with_times: bool,
) -> Result<(), RestoreError> {
    // chown clears setuid/setgid, so ownership goes first.
    set_owner_best_effort(accessor, path, attrs);
    fs::apply_mode(path, attrs.mode).map_err(|e| RestoreError::io("set mode of", path, e))?;
    if with_times {
        fs::set_times(path, &attrs.access_time, &attrs.mod_time)
            .map_err(|e| RestoreError::io("set times of", path, e))?;
    }
    Ok(())
}

/// Ownership is best effort: unprivileged restores cannot give files away.
fn set_owner_best_effort(accessor: &dyn MetadataAccessor, path: &Path, attrs: Attrs) {
    match accessor.set_owner(path, attrs.uid, attrs.gid) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            debug!(path = %path.display(), uid = attrs.uid, gid = attrs.gid, "Not permitted to set owner");
        }
        Err(e) => {
            warn!(path = %path.display(), uid = attrs.uid, gid = attrs.gid, error = %e, "Failed to set owner");
        }
    }
}

/// Set access/modify times on a path; used for the directory pass after a run.
pub(crate) async fn reapply_times(
    path: PathBuf,
    access_time: DateTime<FixedOffset>,
    mod_time: DateTime<FixedOffset>,
) -> Result<(), RestoreError> {
    blocking(move || {
        fs::set_times(&path, &access_time, &mod_time).map_err(|e| RestoreError::io("set times of", &path, e))
    })
    .await
}
