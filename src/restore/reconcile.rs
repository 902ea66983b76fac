//! Reconciliation
//!
//! Pure decision logic: compare one index node against whatever currently
//! occupies its destination and pick the cheapest action that brings the
//! local entry back in line. Change time says "something changed"; modify
//! time says "the content changed".

use crate::index::timestamp::same_time;
use crate::index::{Node, NodeKind};
use crate::platform::LocalMetadata;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Nothing exists locally: build the entry with content and metadata.
    Create,
    /// Reapply mode and owner (plus timestamps for files and directories).
    UpdateMetadataOnly,
    /// Remove the local file and rebuild it from every chunk.
    RecreateContent,
    Skip,
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Create => "create",
            Decision::UpdateMetadataOnly => "update",
            Decision::RecreateContent => "recreate",
            Decision::Skip => "skip",
        }
    }

    /// Whether carrying out the decision touches the filesystem.
    pub fn mutates(&self) -> bool {
        !matches!(self, Decision::Skip)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decide what to do with `node` given the observed local entry, if any.
pub fn decide(node: &Node, local: Option<&LocalMetadata>) -> Decision {
    let Some(local) = local else {
        return Decision::Create;
    };
    if same_time(&local.change_time, &node.change_time) {
        return Decision::Skip;
    }
    match node.kind {
        NodeKind::Symlink { .. } | NodeKind::Directory => Decision::UpdateMetadataOnly,
        NodeKind::File { .. } => {
            if same_time(&local.mod_time, &node.mod_time) {
                Decision::UpdateMetadataOnly
            } else {
                Decision::RecreateContent
            }
        }
    }
}
