//! Configuration
//!
//! Layered configuration for restore runs: built-in defaults, the global
//! config file, a `rehydrate.toml` in the working directory, then
//! `REHYDRATE_*` environment variables.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sections;
pub mod sources;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use sections::{BackendKind, CacheConfig, RestoreSettings, StorageConfig};

use crate::error::RestoreError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

const REDACTED: &str = "<redacted>";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RehydrateConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub restore: RestoreSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RehydrateConfig {
    /// Reject configurations a restore cannot run with.
    pub fn validate(&self) -> Result<(), RestoreError> {
        self.storage.validate().map_err(RestoreError::Config)?;
        self.restore.validate().map_err(RestoreError::Config)?;
        Ok(())
    }

    /// Copy with credentials masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.storage.access_key_id.is_some() {
            config.storage.access_key_id = Some(REDACTED.to_string());
        }
        if config.storage.secret_access_key.is_some() {
            config.storage.secret_access_key = Some(REDACTED.to_string());
        }
        config
    }
}
