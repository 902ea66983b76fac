//! Destination path resolution.

use crate::index::Node;
use std::path::{Component, Path, PathBuf};

/// Where `node` is written for a restore into `dest`.
///
/// Restoring into the directory the snapshot was captured from puts every
/// entry back at its original absolute path; any other destination gets the
/// entry's relative path joined onto it.
pub fn destination_for(node: &Node, dest: &Path) -> PathBuf {
    let dest = clean_path(dest);
    if dest == clean_path(&node.base_path) {
        node.absolute_path.clone()
    } else {
        clean_path(&dest.join(&node.relative_path))
    }
}

/// Lexically normalise a path: drop `.`, fold `name/..`, never climb above
/// the root. An empty result is `.`.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}
