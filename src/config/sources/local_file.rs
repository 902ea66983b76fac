//! Working-directory config file source: ./rehydrate.toml

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::Path;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "rehydrate.toml";

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    working_dir: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = working_dir.join(LOCAL_CONFIG_FILE);
    Ok(builder.add_source(File::from(path).required(false)))
}
