//! Config file location.
//!
//! Priority:
//! 1. `--config` flag (set via [`set_config_path`])
//! 2. `ULOG_TRACE_CONFIG_PATH` environment variable
//! 3. `<platform config dir>/ulog-trace/config.toml`

use std::path::PathBuf;
use std::sync::OnceLock;

use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};

pub const CONFIG_PATH_ENV: &str = "ULOG_TRACE_CONFIG_PATH";

/// Override for the config path, set via --config CLI flag
static CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

pub fn set_config_path(path: PathBuf) {
    CONFIG_PATH.set(path).ok();
}

/// Whether `--config` was given. An explicit path that doesn't exist is an
/// error; the default location is allowed to be missing.
pub fn is_config_path_explicit() -> bool {
    CONFIG_PATH.get().is_some()
}

pub fn get_config_path() -> Option<PathBuf> {
    if let Some(path) = CONFIG_PATH.get() {
        return Some(path.clone());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    // XDG on Linux and macOS, %APPDATA% on Windows
    let strategy = choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("ulog-trace").join("config.toml"))
}
