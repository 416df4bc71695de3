use std::io::Write;

use anyhow::Context;

use super::{Emitter, metrics};
use crate::trace::Snapshot;

/// Writes each window as one JSON array of `{name, value, timestamp}` objects
/// per line.
pub struct JsonEmitter<W: Write> {
    out: W,
    namespace: String,
}

impl<W: Write> JsonEmitter<W> {
    pub fn new(out: W, namespace: impl Into<String>) -> Self {
        Self {
            out,
            namespace: namespace.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Emitter for JsonEmitter<W> {
    fn emit(&mut self, snapshot: &Snapshot, timestamp: u64) -> anyhow::Result<()> {
        let metrics = metrics(snapshot, &self.namespace, timestamp);
        serde_json::to_writer(&mut self.out, &metrics).context("Failed to write JSON metrics")?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
