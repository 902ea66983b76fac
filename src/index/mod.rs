//! Snapshot Index
//!
//! In-memory form of a backup manifest: one [`Node`] per captured filesystem
//! entry, each carrying metadata and, for regular files, the ordered list of
//! content chunks that rebuild it. An [`Index`] is loaded once per restore run
//! and shared read-only between all workers.

pub mod cache;
pub mod timestamp;

use crate::error::RestoreError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

pub use cache::{IndexCache, IndexSource};

/// Permission bits that are applied to restored entries.
pub const PERMISSION_MASK: u32 = 0o7777;

// Capture tools built on Go record setuid/setgid/sticky as high flag bits
// instead of the POSIX positions.
const FLAG_SETUID: u32 = 1 << 23;
const FLAG_SETGID: u32 = 1 << 22;
const FLAG_STICKY: u32 = 1 << 20;

/// Reference to one stored chunk and the offset its bytes belong at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    /// Object key of the chunk in the backup bucket.
    pub etag: String,
    /// Byte offset of the chunk within the reconstructed file.
    pub start: u64,
}

/// Per-type payload of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    File {
        #[serde(default, deserialize_with = "null_as_default")]
        content: Vec<ChunkRef>,
    },
    #[serde(rename = "dir")]
    Directory,
    Symlink { link_target: PathBuf },
}

/// One filesystem entry captured in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    pub name: String,
    /// Root the entry was captured under.
    pub base_path: PathBuf,
    pub absolute_path: PathBuf,
    pub relative_path: PathBuf,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub access_time: DateTime<FixedOffset>,
    pub mod_time: DateTime<FixedOffset>,
    pub change_time: DateTime<FixedOffset>,
}

impl Node {
    /// Short type label used in logs and listings.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::File { .. } => "file",
            NodeKind::Directory => "dir",
            NodeKind::Symlink { .. } => "symlink",
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory)
    }

    /// Chunk list for file nodes; empty for everything else.
    pub fn content(&self) -> &[ChunkRef] {
        match &self.kind {
            NodeKind::File { content } => content,
            _ => &[],
        }
    }

    /// Mode bits to apply on disk (file type bits stripped).
    pub fn permissions(&self) -> u32 {
        let mut bits = self.mode & PERMISSION_MASK;
        if self.mode & FLAG_SETUID != 0 {
            bits |= 0o4000;
        }
        if self.mode & FLAG_SETGID != 0 {
            bits |= 0o2000;
        }
        if self.mode & FLAG_STICKY != 0 {
            bits |= 0o1000;
        }
        bits
    }
}

/// Complete manifest for one snapshot (recovery point).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    #[serde(default)]
    pub recovery_point_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Node>,
}

impl Index {
    pub fn new(recovery_point_id: impl Into<String>, items: Vec<Node>) -> Self {
        Self {
            recovery_point_id: recovery_point_id.into(),
            items,
        }
    }

    /// Parse and validate an index document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, RestoreError> {
        let index: Index = serde_json::from_slice(bytes)?;
        index.validate()?;
        Ok(index)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, RestoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check that relative paths are unique and stay inside the restore root.
    pub fn validate(&self) -> Result<(), RestoreError> {
        let mut seen = HashSet::with_capacity(self.items.len());
        for node in &self.items {
            check_relative_path(&node.relative_path)?;
            if !seen.insert(node.relative_path.as_path()) {
                return Err(RestoreError::InvalidIndex(format!(
                    "duplicate relative path '{}'",
                    node.relative_path.display()
                )));
            }
        }
        Ok(())
    }
}

fn check_relative_path(path: &Path) -> Result<(), RestoreError> {
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(RestoreError::InvalidIndex(format!(
                    "relative path '{}' escapes the restore root",
                    path.display()
                )))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(RestoreError::InvalidIndex(format!(
                    "relative path '{}' is absolute",
                    path.display()
                )))
            }
        }
    }
    Ok(())
}

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
