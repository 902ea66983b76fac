//! Rehydrate: Restore Engine for Chunked Backups
//!
//! Rebuilds a filesystem tree from a snapshot index and the content chunks it
//! references in an object store. Each index entry is reconciled against the
//! destination (create, update metadata, recreate content, or skip) and the
//! resulting work runs with bounded concurrency, stopping at the first failure.

pub mod concurrency;
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod platform;
pub mod restore;
pub mod storage;
pub mod tooling;

pub use error::{RestoreError, StorageError};
pub use index::{ChunkRef, Index, Node, NodeKind};
pub use restore::{Decision, RestoreOptions, RestoreReport, Restorer};
