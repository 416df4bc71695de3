//! Configuration for follow mode.
//!
//! A TOML file with kebab-case keys, every one optional:
//!
//! ```toml
//! ulog-prefix = "/opt/app/logs/ULOG"
//! window-secs = 60
//! poll-interval-ms = 1000
//! start-at = "end"          # or "beginning"
//! max-open-retries = 30     # unset: retry forever
//! max-idle-windows = 10     # drop unfinished invocations after this many quiet windows
//! namespace = "tuxedo"
//!
//! [graphite]
//! address = "graphite.example.com:2003"
//! ```
//!
//! Command-line flags override the file. See [`path`] for where the file is
//! looked up.

pub mod path;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::UlogError;
use crate::follow::{FollowConfig, StartPosition};
use crate::trace::{DEFAULT_MAX_IDLE_WINDOWS, Tracker};

pub use path::{get_config_path, is_config_path_explicit, set_config_path};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// ULOG path without the `.MMDDYY` suffix
    pub ulog_prefix: Option<PathBuf>,
    pub window_secs: u64,
    pub poll_interval_ms: u64,
    pub start_at: StartPosition,
    pub max_open_retries: Option<u32>,
    /// Windows without events before an unfinished invocation is dropped
    pub max_idle_windows: u32,
    /// First segment of every metric name
    pub namespace: String,
    pub graphite: Option<GraphiteConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GraphiteConfig {
    /// `host:port` of a Carbon plaintext listener
    pub address: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ulog_prefix: None,
            window_secs: 60,
            poll_interval_ms: 1000,
            start_at: StartPosition::End,
            max_open_retries: None,
            max_idle_windows: DEFAULT_MAX_IDLE_WINDOWS,
            namespace: "tuxedo".to_string(),
            graphite: None,
        }
    }
}

impl Config {
    /// Load from the resolved config location.
    ///
    /// A missing file at the default location gives the defaults; a missing
    /// file passed with `--config` is an error.
    pub fn load_resolved() -> Result<Self, UlogError> {
        let Some(path) = get_config_path() else {
            log::debug!("No config directory on this platform; using defaults");
            return Ok(Self::default());
        };
        if is_config_path_explicit() && !path.exists() {
            return Err(UlogError::ConfigRead {
                path,
                source: io::Error::new(io::ErrorKind::NotFound, "file not found"),
            });
        }
        Self::load(&path)
    }

    /// Load from `path`, or the defaults if there's no file there.
    pub fn load(path: &Path) -> Result<Self, UlogError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No config at {}; using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(UlogError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        log::debug!("Loading config from {}", path.display());
        Self::from_toml(&contents, path)
    }

    pub fn from_toml(contents: &str, path: &Path) -> Result<Self, UlogError> {
        toml::from_str(contents).map_err(|e| UlogError::ConfigParse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Where the ULOG lives: `ulog-prefix`, else `$ULOGPFX`, else
    /// `$APPDIR/ULOG`, which is where the middleware itself looks.
    pub fn ulog_prefix(&self) -> Result<PathBuf, UlogError> {
        self.resolve_prefix(|key| std::env::var(key).ok())
    }

    fn resolve_prefix(&self, env: impl Fn(&str) -> Option<String>) -> Result<PathBuf, UlogError> {
        if let Some(prefix) = &self.ulog_prefix {
            return Ok(prefix.clone());
        }
        if let Some(prefix) = env("ULOGPFX").filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(prefix));
        }
        if let Some(appdir) = env("APPDIR").filter(|p| !p.is_empty()) {
            return Ok(Path::new(&appdir).join("ULOG"));
        }
        Err(UlogError::MissingPrefix)
    }

    pub fn follow_config(&self) -> Result<FollowConfig, UlogError> {
        Ok(FollowConfig {
            prefix: self.ulog_prefix()?,
            poll_interval: self.poll_interval(),
            start_at: self.start_at,
            max_open_retries: self.max_open_retries,
        })
    }

    pub fn tracker(&self) -> Tracker {
        Tracker::with_max_idle_windows(self.max_idle_windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.window(), Duration::from_secs(60));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.start_at, StartPosition::End);
        assert_eq!(config.namespace, "tuxedo");
        assert_eq!(config.max_idle_windows, DEFAULT_MAX_IDLE_WINDOWS);
    }

    #[test]
    fn test_parse_full() {
        let config = Config::from_toml(
            r#"
ulog-prefix = "/var/tux/ULOG"
window-secs = 10
poll-interval-ms = 250
start-at = "beginning"
max-open-retries = 3
max-idle-windows = 4
namespace = "prod.tux"

[graphite]
address = "carbon:2003"
"#,
            Path::new("config.toml"),
        )
        .unwrap();

        assert_eq!(config.ulog_prefix, Some(PathBuf::from("/var/tux/ULOG")));
        assert_eq!(config.window(), Duration::from_secs(10));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.start_at, StartPosition::Beginning);
        assert_eq!(config.max_open_retries, Some(3));
        assert_eq!(config.max_idle_windows, 4);
        assert_eq!(config.namespace, "prod.tux");
        assert_eq!(config.graphite.unwrap().address, "carbon:2003");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml("window-secs = 5\n", Path::new("c.toml")).unwrap();
        assert_eq!(config.window_secs, 5);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.namespace, "tuxedo");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Config::from_toml("windw-secs = 5\n", Path::new("c.toml")).unwrap_err();
        assert!(matches!(err, UlogError::ConfigParse { .. }));
        assert!(err.to_string().contains("windw-secs"), "{err}");
    }

    #[test]
    fn test_bad_start_position_rejected() {
        let err = Config::from_toml("start-at = \"middle\"\n", Path::new("c.toml")).unwrap_err();
        assert!(matches!(err, UlogError::ConfigParse { .. }));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "namespace = \"tux\"\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().namespace, "tux");
    }

    #[test]
    fn test_load_directory_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, UlogError::ConfigRead { .. }));
    }

    #[test]
    fn test_prefix_from_config_wins() {
        let config = Config {
            ulog_prefix: Some(PathBuf::from("/cfg/ULOG")),
            ..Config::default()
        };
        let prefix = config
            .resolve_prefix(|_| Some("/env/ULOG".to_string()))
            .unwrap();
        assert_eq!(prefix, PathBuf::from("/cfg/ULOG"));
    }

    #[test]
    fn test_prefix_from_ulogpfx() {
        let prefix = Config::default()
            .resolve_prefix(|key| (key == "ULOGPFX").then(|| "/env/ULOG".to_string()))
            .unwrap();
        assert_eq!(prefix, PathBuf::from("/env/ULOG"));
    }

    #[test]
    fn test_prefix_from_appdir() {
        let prefix = Config::default()
            .resolve_prefix(|key| (key == "APPDIR").then(|| "/opt/app".to_string()))
            .unwrap();
        assert_eq!(prefix, PathBuf::from("/opt/app/ULOG"));
    }

    #[test]
    fn test_missing_prefix() {
        let err = Config::default().resolve_prefix(no_env).unwrap_err();
        assert!(matches!(err, UlogError::MissingPrefix));
    }

    #[test]
    fn test_follow_config() {
        let config = Config {
            ulog_prefix: Some(PathBuf::from("/logs/ULOG")),
            poll_interval_ms: 50,
            start_at: StartPosition::Beginning,
            max_open_retries: Some(2),
            ..Config::default()
        };
        let follow = config.follow_config().unwrap();
        assert_eq!(follow.prefix, PathBuf::from("/logs/ULOG"));
        assert_eq!(follow.poll_interval, Duration::from_millis(50));
        assert_eq!(follow.start_at, StartPosition::Beginning);
        assert_eq!(follow.max_open_retries, Some(2));
    }
}
