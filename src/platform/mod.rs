//! Local filesystem access
//!
//! [`MetadataAccessor`] is the seam between the restore engine and the host's
//! ownership and metadata primitives. [`fs::NativeMetadata`] is the production
//! implementation; tests substitute instrumented accessors.

pub mod fs;

use chrono::{DateTime, Utc};
use std::io;
use std::path::Path;

pub use fs::NativeMetadata;

/// What currently occupies a destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// Observed state of a local entry (never follows symlinks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMetadata {
    pub kind: EntryKind,
    pub change_time: DateTime<Utc>,
    pub mod_time: DateTime<Utc>,
    pub access_time: DateTime<Utc>,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub len: u64,
}

pub trait MetadataAccessor: Send + Sync {
    /// `Ok(None)` when nothing exists at `path`.
    fn read_local(&self, path: &Path) -> io::Result<Option<LocalMetadata>>;

    /// Change ownership of `path` itself (not a symlink's target).
    fn set_owner(&self, path: &Path, uid: u32, gid: u32) -> io::Result<()>;
}
