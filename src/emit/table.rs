use std::io::Write;

use super::Emitter;
use crate::trace::{Snapshot, render, service_rows};
use crate::utils::format_timestamp_iso8601;

/// Prints a timing table per window, headed by the window's end time.
pub struct TableEmitter<W: Write> {
    out: W,
}

impl<W: Write> TableEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Emitter for TableEmitter<W> {
    fn emit(&mut self, snapshot: &Snapshot, timestamp: u64) -> anyhow::Result<()> {
        writeln!(self.out, "== window ending {}", format_timestamp_iso8601(timestamp))?;
        let rows = service_rows(snapshot);
        if rows.is_empty() {
            writeln!(self.out, "(no completed service calls)")?;
        } else {
            write!(self.out, "{}", render(&rows))?;
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
