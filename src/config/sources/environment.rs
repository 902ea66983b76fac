//! Environment variable source: REHYDRATE_ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Prefix shared by all configuration environment variables.
pub const ENV_PREFIX: &str = "REHYDRATE";

/// Build the environment source.
///
/// `REHYDRATE_STORAGE__BUCKET=backups` sets `storage.bucket`.
pub fn source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Add environment variable overlay to builder.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(source()))
}
