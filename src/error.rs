//! Error types for ulog-trace.
//!
//! Per-line trace processing never fails; malformed records are skipped.
//! `UlogError` covers the places that can: reading configuration and
//! delivering metrics. Use `.into()` to convert to `anyhow::Error` at the
//! CLI boundary; the type survives for `downcast_ref`.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum UlogError {
    /// Config file exists but couldn't be read
    #[error("failed to read config file {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file isn't valid TOML or has unknown values
    #[error("failed to parse config file {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// Neither config nor environment say where the ULOG lives
    #[error("no ULOG prefix configured (set ulog-prefix in config, ULOGPFX or APPDIR)")]
    MissingPrefix,

    /// A metric sink could not be reached or written to
    #[error("failed to deliver metrics to {sink}")]
    Delivery {
        sink: String,
        #[source]
        source: io::Error,
    },
}
