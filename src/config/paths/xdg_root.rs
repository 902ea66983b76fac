//! XDG Base Directory utilities for config and cache locations.

use std::path::PathBuf;

const APP_DIR: &str = "rehydrate";

/// Get XDG config home directory
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise defaults to `$HOME/.config`
pub fn config_home() -> Option<PathBuf> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Some(PathBuf::from(xdg_config_home));
        }
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config"))
}

/// Get XDG cache home directory
///
/// Returns `$XDG_CACHE_HOME` if set, otherwise defaults to `$HOME/.cache`
pub fn cache_home() -> Option<PathBuf> {
    if let Ok(xdg_cache_home) = std::env::var("XDG_CACHE_HOME") {
        if !xdg_cache_home.is_empty() {
            return Some(PathBuf::from(xdg_cache_home));
        }
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".cache"))
}

/// Global config file: `$XDG_CONFIG_HOME/rehydrate/config.toml`
pub fn global_config_path() -> Option<PathBuf> {
    config_home().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// Default index cache root: `$XDG_CACHE_HOME/rehydrate`
pub fn default_cache_root() -> Option<PathBuf> {
    cache_home().map(|dir| dir.join(APP_DIR))
}
