//! Integration tests: the `ulog-trace` binary and the follow pipeline end to end.

mod cli;
mod follow;

use std::path::PathBuf;

/// The ULOG fixture shared with the unit tests.
pub fn sample_ulog() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/trace/testdata/sample.ulog")
}
