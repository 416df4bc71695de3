//! Analyze a complete ULOG in one pass.

use std::io::{self, BufRead};
use std::time::Duration;

use super::parse::{TRACE_MARKER, TraceEvent, parse_line};
use super::stats::{ServiceStore, Snapshot};
use super::tracker::Tracker;

/// Correlate already-parsed events and return the resulting statistics.
///
/// Invocations still open at the end contribute their finished calls, with
/// no invocation count.
pub fn analyze(events: &[TraceEvent]) -> Snapshot {
    let mut tracker = Tracker::new();
    let mut store = ServiceStore::new();
    for event in events {
        tracker.observe(event, &mut store);
    }
    tracker.fold_open(&mut store);
    store.snapshot_and_reset()
}

/// Same as [`analyze`], streaming lines from `reader`.
///
/// Lines that aren't valid UTF-8 are decoded lossily rather than rejected.
pub fn analyze_reader<R: BufRead>(mut reader: R) -> io::Result<Snapshot> {
    let mut tracker = Tracker::new();
    let mut store = ServiceStore::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        if !line.contains(TRACE_MARKER) {
            continue;
        }
        if let Some(event) = parse_line(&line) {
            tracker.observe(&event, &mut store);
        }
    }

    tracker.fold_open(&mut store);
    Ok(store.snapshot_and_reset())
}

/// One outbound call line under a service in the timing report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRow {
    /// `tpcall(NAME)` or `tpacall(NAME)`
    pub label: String,
    pub count: u64,
    pub total: Duration,
}

/// One service in the timing report, with its calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRow {
    pub name: String,
    pub count: u64,
    pub total: Duration,
    pub errors: u64,
    pub calls: Vec<CallRow>,
}

/// Dispatched services ordered by total time, slowest first.
///
/// Process-level pseudo-services are left out; they only ever call.
pub fn service_rows(snapshot: &Snapshot) -> Vec<ServiceRow> {
    let mut rows: Vec<ServiceRow> = snapshot
        .services
        .iter()
        .filter(|s| s.service.is_service())
        .map(|s| {
            let mut calls: Vec<CallRow> = s
                .calls
                .iter()
                .map(|(target, t)| ("tpcall", target, t))
                .chain(s.acalls.iter().map(|(target, t)| ("tpacall", target, t)))
                .map(|(function, target, t)| CallRow {
                    label: format!("{function}({})", target.name()),
                    count: t.count,
                    total: t.total,
                })
                .collect();
            calls.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.label.cmp(&b.label)));

            ServiceRow {
                name: s.service.name().to_string(),
                count: s.count,
                total: s.total,
                errors: s.errors,
                calls,
            }
        })
        .collect();

    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    rows
}
