//! Logging
//!
//! `tracing` subscriber setup for the binary. Per-item restore decisions are
//! emitted at `info` and chunk traffic at `debug`, so `REHYDRATE_LOG=debug`
//! shows every chunk written.
//!
//! Settings are resolved highest first: command-line flags (folded into the
//! [`LoggingConfig`] by the caller), `REHYDRATE_LOG*` environment variables,
//! the config file, then defaults.

use crate::error::RestoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_FILTER: &str = "REHYDRATE_LOG";
const ENV_FORMAT: &str = "REHYDRATE_LOG_FORMAT";
const ENV_OUTPUT: &str = "REHYDRATE_LOG_OUTPUT";
const ENV_FILE: &str = "REHYDRATE_LOG_FILE";
const ENV_MODULES: &str = "REHYDRATE_LOG_MODULES";

/// `[logging]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// trace, debug, info, warn, error or off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// text or json
    #[serde(default = "default_format")]
    pub format: String,

    /// stdout, stderr, file, file+stderr or both (stdout and stderr)
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file when `output` includes a file; unset means the state directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// ANSI colours for text logs on a terminal stream.
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-module levels, e.g. `rehydrate::restore = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    LogFormat::Text.as_str().to_string()
}

// stdout carries command output.
fn default_output() -> String {
    LogOutput::Stderr.as_str().to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: true,
            modules: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = RestoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(RestoreError::Config(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
    FileAndStderr,
    /// stdout and stderr
    Both,
}

impl LogOutput {
    pub fn as_str(self) -> &'static str {
        match self {
            LogOutput::Stdout => "stdout",
            LogOutput::Stderr => "stderr",
            LogOutput::File => "file",
            LogOutput::FileAndStderr => "file+stderr",
            LogOutput::Both => "both",
        }
    }

    pub fn writes_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::FileAndStderr)
    }

    fn make_writer(self, log_file: Option<Arc<File>>) -> Result<BoxMakeWriter, RestoreError> {
        let file = || {
            log_file
                .clone()
                .ok_or_else(|| RestoreError::Config("Log file was not opened".to_string()))
        };
        Ok(match self {
            LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogOutput::Both => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
            LogOutput::File => BoxMakeWriter::new(file()?),
            LogOutput::FileAndStderr => BoxMakeWriter::new(file()?.and(std::io::stderr)),
        })
    }
}

impl FromStr for LogOutput {
    type Err = RestoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            "file+stderr" => Ok(LogOutput::FileAndStderr),
            "both" => Ok(LogOutput::Both),
            other => Err(RestoreError::Config(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                other
            ))),
        }
    }
}

/// Log file path: explicit flag, then `REHYDRATE_LOG_FILE`, then the config
/// file, then `rehydrate.log` in the platform state directory.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
) -> Result<PathBuf, RestoreError> {
    let env_file = std::env::var_os(ENV_FILE).map(PathBuf::from);
    match [cli_file, env_file, config_file]
        .into_iter()
        .flatten()
        .find(|p| !p.as_os_str().is_empty())
    {
        Some(path) => Ok(path),
        None => default_log_file_path(),
    }
}

fn default_log_file_path() -> Result<PathBuf, RestoreError> {
    let dirs = directories::ProjectDirs::from("", "rehydrate", "rehydrate").ok_or_else(|| {
        RestoreError::Config("Could not determine platform directories for log file".to_string())
    })?;
    // state_dir only exists on Linux.
    let dir = dirs.state_dir().unwrap_or_else(|| dirs.cache_dir());
    Ok(dir.join("rehydrate.log"))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), RestoreError> {
    let installed = if config.is_some_and(|c| !c.enabled) {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .try_init()
    } else {
        let filter = build_env_filter(config)?;
        let format = resolve(ENV_FORMAT, config.map(|c| c.format.as_str()), LogFormat::Text)?;
        let output = resolve(ENV_OUTPUT, config.map(|c| c.output.as_str()), LogOutput::Stderr)?;

        let log_file = if output.writes_file() {
            let path = resolve_log_file_path(None, config.and_then(|c| c.file.clone()))?;
            Some(open_log_file(&path)?)
        } else {
            None
        };
        let writer = output.make_writer(log_file)?;
        let color = config.map_or(true, |c| c.color) && !output.writes_file();

        let registry = Registry::default().with(filter);
        match format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_writer(writer),
                )
                .try_init(),
            LogFormat::Text => registry
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_ansi(color)
                        .with_writer(writer),
                )
                .try_init(),
        }
    };
    installed.map_err(|e| RestoreError::Config(format!("Failed to install logger: {}", e)))
}

/// A valid environment value wins; an invalid one is ignored. An invalid
/// configured value is an error.
fn resolve<T>(env_var: &str, configured: Option<&str>, default: T) -> Result<T, RestoreError>
where
    T: FromStr<Err = RestoreError>,
{
    if let Some(parsed) = std::env::var(env_var).ok().and_then(|v| v.parse().ok()) {
        return Ok(parsed);
    }
    configured.map_or(Ok(default), str::parse)
}

fn open_log_file(path: &Path) -> Result<Arc<File>, RestoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| RestoreError::Config(format!("Failed to create log directory: {}", e)))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            RestoreError::Config(format!("Failed to open log file {}: {}", path.display(), e))
        })?;
    Ok(Arc::new(file))
}

/// `REHYDRATE_LOG` replaces everything else. Otherwise the configured level is
/// extended with per-module directives from the config and from
/// `REHYDRATE_LOG_MODULES` (`module=level,module=level`).
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, RestoreError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }

    let level = config.map_or("info", |c| c.level.as_str());
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut directives: Vec<(String, String)> = config
        .map(|c| c.modules.clone().into_iter().collect())
        .unwrap_or_default();
    if let Ok(list) = std::env::var(ENV_MODULES) {
        directives.extend(parse_module_levels(&list));
    }

    directives
        .into_iter()
        .try_fold(EnvFilter::new(level), |filter, (module, module_level)| {
            let directive = format!("{}={}", module, module_level)
                .parse::<Directive>()
                .map_err(|e| RestoreError::Config(format!("Invalid log directive: {}", e)))?;
            Ok(filter.add_directive(directive))
        })
}

fn parse_module_levels(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .filter_map(|entry| entry.split_once('='))
        .map(|(module, level)| (module.trim().to_string(), level.trim().to_string()))
        .filter(|(module, level)| !module.is_empty() && !level.is_empty())
        .collect()
}
