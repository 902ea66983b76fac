//! CacheConfig and resolution of the local index cache root.

use crate::config::xdg;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Used when no XDG cache directory can be determined.
const FALLBACK_CACHE_ROOT: &str = ".cache";

/// Index cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding `<snapshot>/index.json`; defaults to the XDG cache dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl CacheConfig {
    /// Resolve the cache root to an actual filesystem location.
    pub fn resolve_root(&self) -> PathBuf {
        if let Some(root) = &self.root {
            return root.clone();
        }
        xdg::default_cache_root().unwrap_or_else(|| PathBuf::from(FALLBACK_CACHE_ROOT))
    }
}
