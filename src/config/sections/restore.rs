//! Restore worker settings.

use serde::{Deserialize, Serialize};

fn default_chunk_fetch_concurrency() -> usize {
    1
}

/// Restore configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreSettings {
    /// Concurrent units of work; defaults to the number of available CPUs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    /// Chunk fetches in flight per file while writing it.
    #[serde(default = "default_chunk_fetch_concurrency")]
    pub chunk_fetch_concurrency: usize,
}

impl RestoreSettings {
    pub fn worker_count(&self) -> usize {
        self.max_workers.unwrap_or_else(available_workers)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == Some(0) {
            return Err("restore.max_workers must be at least 1".to_string());
        }
        if self.chunk_fetch_concurrency == 0 {
            return Err("restore.chunk_fetch_concurrency must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for RestoreSettings {
    fn default() -> Self {
        Self {
            max_workers: None,
            chunk_fetch_concurrency: default_chunk_fetch_concurrency(),
        }
    }
}

/// Number of processing units on this host.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
