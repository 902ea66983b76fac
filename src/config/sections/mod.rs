//! Configuration sections.

pub mod cache;
pub mod restore;
pub mod storage;

pub use cache::CacheConfig;
pub use restore::RestoreSettings;
pub use storage::{BackendKind, StorageConfig};
