//! Built-in defaults that every source is layered over.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("storage.backend", "s3")?
        .set_default("storage.timeout_secs", 30i64)?
        .set_default("restore.chunk_fetch_concurrency", 1i64)?
        .set_default("logging.output", "stderr")
}
