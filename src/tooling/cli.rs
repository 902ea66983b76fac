//! CLI Tooling
//!
//! Command-line interface for restore runs. Every command returns its output
//! as a string; the binary decides where it goes.

use crate::config::{ConfigLoader, RehydrateConfig};
use crate::error::RestoreError;
use crate::index::{IndexCache, IndexSource};
use crate::logging::LoggingConfig;
use crate::platform::NativeMetadata;
use crate::restore::{RestoreOptions, Restorer};
use crate::storage::{ObjectStoreBackend, ObjectStoreClient};
use crate::tooling::format::{format_index, format_plan, format_restore_report};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Rehydrate CLI - restore filesystem trees from chunked backups
#[derive(Parser, Debug)]
#[command(name = "rehydrate")]
#[command(about = "Restore filesystem trees from chunked object-store backups")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Restore a snapshot into a destination directory
    Restore {
        /// Snapshot (recovery point) identifier
        snapshot_id: String,

        /// Destination directory; the capture root restores in place
        dest: PathBuf,

        /// Maximum concurrent units of work (defaults to CPU count)
        #[arg(long)]
        workers: Option<usize>,

        /// Show what would be done without touching the destination
        #[arg(long)]
        dry_run: bool,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List the entries of a snapshot index
    Index {
        /// Snapshot (recovery point) identifier
        snapshot_id: String,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the effective configuration (credentials redacted)
    Config,
}

impl Cli {
    /// Logging settings from config with command-line flags layered on top.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

/// Loaded configuration plus the cancellation token shared by long-running
/// commands.
pub struct CliContext {
    config: RehydrateConfig,
    cancel: CancellationToken,
}

impl CliContext {
    /// Load configuration from `config_path`, or from the layered defaults
    /// rooted at the current directory.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, RestoreError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => {
                let cwd = std::env::current_dir()
                    .map_err(|e| RestoreError::io("resolve", PathBuf::from("."), e))?;
                ConfigLoader::load(&cwd)?
            }
        };
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: RehydrateConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &RehydrateConfig {
        &self.config
    }

    /// Token cancelled on interrupt; cancelling it stops a running restore.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute a CLI command
    pub async fn execute(&self, command: &Commands) -> Result<String, RestoreError> {
        match command {
            Commands::Restore {
                snapshot_id,
                dest,
                workers,
                dry_run,
                format,
            } => {
                self.handle_restore(snapshot_id, dest, *workers, *dry_run, format)
                    .await
            }
            Commands::Index {
                snapshot_id,
                format,
            } => self.handle_index(snapshot_id, format).await,
            Commands::Config => self.handle_config(),
        }
    }

    async fn handle_restore(
        &self,
        snapshot_id: &str,
        dest: &Path,
        workers: Option<usize>,
        dry_run: bool,
        format: &str,
    ) -> Result<String, RestoreError> {
        check_format(format)?;
        if workers == Some(0) {
            return Err(RestoreError::Config("--workers must be at least 1".to_string()));
        }
        self.config.validate()?;

        let store = self.store()?;
        let mut options = RestoreOptions::from_config(&self.config);
        if let Some(workers) = workers {
            options = options.with_max_workers(workers);
        }
        let restorer = Restorer::new(
            Arc::new(self.index_cache(Arc::clone(&store))),
            store,
            Arc::new(NativeMetadata),
            options,
        );

        if dry_run {
            let plan = restorer.plan(snapshot_id, dest).await?;
            return match format {
                "json" => Ok(serde_json::to_string_pretty(&plan)?),
                _ => Ok(format_plan(&plan)),
            };
        }

        info!(snapshot_id, destination = %dest.display(), "Restore requested");
        let report = restorer
            .restore_with_cancel(snapshot_id, dest, self.cancellation())
            .await?;
        match format {
            "json" => Ok(serde_json::to_string_pretty(&report)?),
            _ => Ok(format_restore_report(&report)),
        }
    }

    async fn handle_index(&self, snapshot_id: &str, format: &str) -> Result<String, RestoreError> {
        check_format(format)?;
        self.config
            .storage
            .validate()
            .map_err(RestoreError::Config)?;
        let cache = self.index_cache(self.store()?);
        let index = cache.load_index(snapshot_id).await?;
        match format {
            "json" => Ok(serde_json::to_string_pretty(&index)?),
            _ => Ok(format_index(&index)),
        }
    }

    fn handle_config(&self) -> Result<String, RestoreError> {
        toml::to_string_pretty(&self.config.redacted())
            .map_err(|e| RestoreError::Config(format!("Failed to render configuration: {}", e)))
    }

    fn store(&self) -> Result<Arc<dyn ObjectStoreClient>, RestoreError> {
        Ok(Arc::new(ObjectStoreBackend::from_config(&self.config.storage)?))
    }

    fn index_cache(&self, store: Arc<dyn ObjectStoreClient>) -> IndexCache {
        IndexCache::new(
            self.config.cache.resolve_root(),
            self.config.storage.bucket.clone(),
            store,
        )
    }
}

fn check_format(format: &str) -> Result<(), RestoreError> {
    match format {
        "text" | "json" => Ok(()),
        other => Err(RestoreError::Config(format!(
            "Invalid output format: {} (must be 'text' or 'json')",
            other
        ))),
    }
}
