//! Fakes and builders shared by the integration tests.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use rehydrate::index::IndexSource;
use rehydrate::platform::{LocalMetadata, MetadataAccessor, NativeMetadata};
use rehydrate::storage::ObjectStoreClient;
use rehydrate::{ChunkRef, Index, Node, NodeKind, RestoreError, StorageError};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const BUCKET: &str = "backups";
pub const CAPTURE_ROOT: &str = "/captured/root";

pub fn ts(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

/// Object store that counts gets and how many are in flight at once.
#[derive(Default)]
pub struct CountingStore {
    objects: Mutex<HashMap<String, Bytes>>,
    delay: Duration,
    gets: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn insert(&self, key: &str, data: &[u8]) {
        self.objects
            .lock()
            .insert(key.to_string(), Bytes::copy_from_slice(data));
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl ObjectStoreClient for CountingStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.fetched.lock().push(key.to_string());
        let found = self.objects.lock().get(key).cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        found.ok_or_else(|| StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn put_object(&self, _: &str, key: &str, data: Bytes) -> Result<(), StorageError> {
        self.objects.lock().insert(key.to_string(), data);
        Ok(())
    }

    async fn head_object(&self, _: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.lock().contains_key(key))
    }

    async fn presigned_url(&self, _: &str, _: &str, _: Duration) -> Result<String, StorageError> {
        Err(StorageError::Unsupported {
            backend: "counting",
            operation: "presigned_url",
        })
    }
}

/// Index source serving one fixed index.
pub struct StaticIndex(pub Index);

#[async_trait]
impl IndexSource for StaticIndex {
    async fn load_index(&self, snapshot_id: &str) -> Result<Index, RestoreError> {
        if snapshot_id != self.0.recovery_point_id {
            return Err(RestoreError::ObjectNotFound {
                bucket: BUCKET.to_string(),
                key: format!("{}/index.json", snapshot_id),
            });
        }
        Ok(self.0.clone())
    }
}

/// Real filesystem reads, except change time is reported as the modify time.
///
/// The kernel stamps ctime on every metadata change and it cannot be set, so
/// this is what lets a second run observe the times the first run applied.
/// Ownership changes are recorded instead of performed.
#[derive(Default)]
pub struct MtimeAsCtime {
    owners: Mutex<Vec<(PathBuf, u32, u32)>>,
}

impl MtimeAsCtime {
    pub fn owner_of(&self, path: &Path) -> Option<(u32, u32)> {
        self.owners
            .lock()
            .iter()
            .rev()
            .find(|(p, _, _)| p == path)
            .map(|(_, uid, gid)| (*uid, *gid))
    }
}

impl MetadataAccessor for MtimeAsCtime {
    fn read_local(&self, path: &Path) -> io::Result<Option<LocalMetadata>> {
        Ok(NativeMetadata.read_local(path)?.map(|mut meta| {
            meta.change_time = meta.mod_time;
            meta
        }))
    }

    fn set_owner(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()> {
        self.owners.lock().push((path.to_path_buf(), uid, gid));
        Ok(())
    }
}

fn node(kind: NodeKind, rel: &str, mode: u32) -> Node {
    let mtime = ts("2023-06-15T09:30:00.123456789+02:00");
    Node {
        kind,
        name: rel.rsplit('/').next().unwrap_or(rel).to_string(),
        base_path: PathBuf::from(CAPTURE_ROOT),
        absolute_path: Path::new(CAPTURE_ROOT).join(rel),
        relative_path: PathBuf::from(rel),
        mode,
        uid: 1001,
        gid: 1002,
        access_time: ts("2023-07-01T00:00:00Z"),
        mod_time: mtime,
        change_time: mtime,
    }
}

pub fn file(rel: &str, chunks: &[(&str, u64)]) -> Node {
    node(
        NodeKind::File {
            content: chunks
                .iter()
                .map(|(etag, start)| ChunkRef {
                    etag: etag.to_string(),
                    start: *start,
                })
                .collect(),
        },
        rel,
        0o640,
    )
}

pub fn dir(rel: &str) -> Node {
    node(NodeKind::Directory, rel, (1 << 31) | 0o750)
}

pub fn symlink(rel: &str, target: &str) -> Node {
    node(
        NodeKind::Symlink {
            link_target: PathBuf::from(target),
        },
        rel,
        (1 << 27) | 0o777,
    )
}

pub fn index(items: Vec<Node>) -> Index {
    Index::new("rp-test", items)
}

/// Mode bits (permissions only) of a path, without following symlinks.
#[cfg(unix)]
pub fn mode_of(path: &Path) -> u32 {
    use std::os::unix::fs::MetadataExt;
    std::fs::symlink_metadata(path).unwrap().mode() & 0o7777
}

pub fn restorer(
    idx: Index,
    store: Arc<CountingStore>,
    accessor: Arc<MtimeAsCtime>,
    workers: usize,
) -> rehydrate::Restorer {
    rehydrate::Restorer::new(
        Arc::new(StaticIndex(idx)),
        store,
        accessor,
        rehydrate::RestoreOptions::new(BUCKET).with_max_workers(workers),
    )
}
