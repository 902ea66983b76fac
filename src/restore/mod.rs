//! Restore Orchestrator
//!
//! Loads the index for a snapshot and drives one reconcile-and-materialize
//! unit per node through a bounded [`TaskGroup`]. The first failing unit stops
//! admission of further units and its error is what the run returns. A failed
//! run leaves a partial tree behind; running it again converges.

pub mod materialize;
pub mod paths;
pub mod reconcile;

use crate::concurrency::TaskGroup;
use crate::config::sections::restore::available_workers;
use crate::config::RehydrateConfig;
use crate::error::RestoreError;
use crate::index::{Index, IndexSource, Node};
use crate::platform::{LocalMetadata, MetadataAccessor};
use crate::storage::ObjectStoreClient;
use chrono::{DateTime, FixedOffset};
use materialize::{Materializer, Outcome};
use parking_lot::Mutex;
use paths::{clean_path, destination_for};
use reconcile::decide;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use reconcile::Decision;

/// Knobs for one restore run.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Bucket holding the chunks named by the index.
    pub bucket: String,
    /// Upper bound on units in flight.
    pub max_workers: usize,
    /// Chunk fetches in flight per file.
    pub chunk_fetch_concurrency: usize,
}

impl RestoreOptions {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            max_workers: available_workers(),
            chunk_fetch_concurrency: 1,
        }
    }

    pub fn from_config(config: &RehydrateConfig) -> Self {
        Self {
            bucket: config.storage.bucket.clone(),
            max_workers: config.restore.worker_count(),
            chunk_fetch_concurrency: config.restore.chunk_fetch_concurrency,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_chunk_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.chunk_fetch_concurrency = concurrency;
        self
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RestoreReport {
    pub snapshot_id: String,
    pub destination: PathBuf,
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub recreated: usize,
    pub skipped: usize,
    pub bytes_written: u64,
    /// Symlinks that could not be created; they do not fail the run.
    pub symlink_failures: Vec<String>,
    pub elapsed_ms: u64,
}

impl RestoreReport {
    fn record(&mut self, decision: Decision, outcome: Outcome) {
        match decision {
            Decision::Create => self.created += 1,
            Decision::UpdateMetadataOnly => self.updated += 1,
            Decision::RecreateContent => self.recreated += 1,
            Decision::Skip => self.skipped += 1,
        }
        self.bytes_written += outcome.bytes_written;
        if let Some(failure) = outcome.symlink_failure {
            self.symlink_failures.push(failure);
        }
    }
}

/// One line of a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedItem {
    pub path: PathBuf,
    pub kind: &'static str,
    pub decision: Decision,
}

/// Directory whose timestamps are set again once every child exists.
struct TouchedDir {
    path: PathBuf,
    access_time: DateTime<FixedOffset>,
    mod_time: DateTime<FixedOffset>,
}

#[derive(Default)]
struct RunState {
    report: RestoreReport,
    touched_dirs: Vec<TouchedDir>,
}

pub struct Restorer {
    index_source: Arc<dyn IndexSource>,
    accessor: Arc<dyn MetadataAccessor>,
    materializer: Arc<Materializer>,
    options: RestoreOptions,
}

impl Restorer {
    pub fn new(
        index_source: Arc<dyn IndexSource>,
        store: Arc<dyn ObjectStoreClient>,
        accessor: Arc<dyn MetadataAccessor>,
        options: RestoreOptions,
    ) -> Self {
        let materializer = Arc::new(Materializer::new(
            store,
            Arc::clone(&accessor),
            options.bucket.clone(),
            options.chunk_fetch_concurrency,
        ));
        Self {
            index_source,
            accessor,
            materializer,
            options,
        }
    }

    pub fn options(&self) -> &RestoreOptions {
        &self.options
    }

    /// Restore `snapshot_id` into `dest`.
    pub async fn restore(&self, snapshot_id: &str, dest: &Path) -> Result<RestoreReport, RestoreError> {
        self.restore_with_cancel(snapshot_id, dest, CancellationToken::new())
            .await
    }

    /// Restore with an externally controlled cancellation token.
    pub async fn restore_with_cancel(
        &self,
        snapshot_id: &str,
        dest: &Path,
        cancel: CancellationToken,
    ) -> Result<RestoreReport, RestoreError> {
        let index = self.index_source.load_index(snapshot_id).await?;
        let mut report = self.restore_index(Arc::new(index), dest, cancel).await?;
        report.snapshot_id = snapshot_id.to_string();
        Ok(report)
    }

    /// Restore an already loaded index.
    pub async fn restore_index(
        &self,
        index: Arc<Index>,
        dest: &Path,
        cancel: CancellationToken,
    ) -> Result<RestoreReport, RestoreError> {
        let started = Instant::now();
        let dest = clean_path(dest);
        let mut group = TaskGroup::new(self.options.max_workers, cancel);
        info!(
            snapshot_id = %index.recovery_point_id,
            destination = %dest.display(),
            items = index.len(),
            workers = group.limit(),
            "Starting restore"
        );

        let state = Arc::new(Mutex::new(RunState::default()));
        for position in 0..index.len() {
            let path = destination_for(&index.items[position], &dest);
            let shared = Arc::clone(&index);
            let accessor = Arc::clone(&self.accessor);
            let materializer = Arc::clone(&self.materializer);
            let state = Arc::clone(&state);
            let admitted = group
                .spawn(move |cancel| async move {
                    let node = &shared.items[position];
                    restore_node(node, path, accessor, &materializer, &state, &cancel).await
                })
                .await;
            if !admitted {
                debug!(remaining = index.len() - position, "Admission stopped");
                break;
            }
        }

        if let Err(err) = group.wait().await {
            warn!(error = %err, "Restore aborted");
            return Err(err);
        }

        let RunState {
            mut report,
            mut touched_dirs,
        } = std::mem::take(&mut *state.lock());
        finalize_directories(&mut touched_dirs).await?;

        report.snapshot_id = index.recovery_point_id.clone();
        report.destination = dest;
        report.total = index.len();
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            created = report.created,
            updated = report.updated,
            recreated = report.recreated,
            skipped = report.skipped,
            bytes_written = report.bytes_written,
            elapsed_ms = report.elapsed_ms,
            "Restore finished"
        );
        Ok(report)
    }

    /// Decide what a restore into `dest` would do, without touching anything.
    pub async fn plan(&self, snapshot_id: &str, dest: &Path) -> Result<Vec<PlannedItem>, RestoreError> {
        let index = self.index_source.load_index(snapshot_id).await?;
        let dest = clean_path(dest);
        let accessor = Arc::clone(&self.accessor);
        blocking(move || {
            index
                .items
                .iter()
                .map(|node| {
                    let path = destination_for(node, &dest);
                    let local = read_local(accessor.as_ref(), &path)?;
                    Ok::<_, RestoreError>(PlannedItem {
                        decision: decide(node, local.as_ref()),
                        kind: node.kind_name(),
                        path,
                    })
                })
                .collect()
        })
        .await
    }
}

async fn restore_node(
    node: &Node,
    path: PathBuf,
    accessor: Arc<dyn MetadataAccessor>,
    materializer: &Materializer,
    state: &Mutex<RunState>,
    cancel: &CancellationToken,
) -> Result<(), RestoreError> {
    let probe = path.clone();
    let local = blocking(move || read_local(accessor.as_ref(), &probe)).await?;
    let decision = decide(node, local.as_ref());
    info!(
        path = %path.display(),
        kind = node.kind_name(),
        decision = %decision,
        "Reconciled"
    );

    let outcome = materializer
        .apply(node, &path, decision, local.as_ref(), cancel)
        .await?;

    let mut state = state.lock();
    if node.is_dir() && decision.mutates() {
        state.touched_dirs.push(TouchedDir {
            path,
            access_time: node.access_time,
            mod_time: node.mod_time,
        });
    }
    state.report.record(decision, outcome);
    Ok(())
}

fn read_local(
    accessor: &dyn MetadataAccessor,
    path: &Path,
) -> Result<Option<LocalMetadata>, RestoreError> {
    accessor
        .read_local(path)
        .map_err(|e| RestoreError::io("inspect", path, e))
}

/// Children created after their directory bump its modify time, so directory
/// times are set again deepest first once the whole tree is in place.
async fn finalize_directories(dirs: &mut [TouchedDir]) -> Result<(), RestoreError> {
    dirs.sort_by_key(|dir| std::cmp::Reverse(dir.path.components().count()));
    for dir in dirs.iter() {
        materialize::reapply_times(dir.path.clone(), dir.access_time, dir.mod_time).await?;
    }
    if !dirs.is_empty() {
        debug!(count = dirs.len(), "Directory timestamps finalized");
    }
    Ok(())
}

pub(crate) async fn blocking<T, F>(work: F) -> Result<T, RestoreError>
where
    F: FnOnce() -> Result<T, RestoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RestoreError::TaskFailed(e.to_string()))?
}
