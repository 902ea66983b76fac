//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::RehydrateConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from files and environment.
    pub fn load(working_dir: &Path) -> Result<RehydrateConfig, ConfigError> {
        MergeService::load(working_dir)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<RehydrateConfig, ConfigError> {
        MergeService::load_from_file(path)
    }
}
