//! ULOG trace parsing, correlation and aggregation.
//!
//! Trace records come from Tuxedo's `TMTRACE=*:ulog` facility. Each record
//! marks entry to or exit from an ATMI function in one process; this module
//! turns those records into per-service invocation counts, elapsed times,
//! error counts and the services each one calls.
//!
//! # Usage
//!
//! ```ignore
//! use ulog_trace::trace::{Tracker, ServiceStore, parse_line};
//!
//! let mut tracker = Tracker::new();
//! let mut store = ServiceStore::new();
//! for line in ulog.lines() {
//!     if let Some(event) = parse_line(line) {
//!         tracker.observe(&event, &mut store);
//!     }
//! }
//! let snapshot = store.snapshot_and_reset();
//! ```

pub mod analyze;
pub mod display;
pub mod graph;
pub mod parse;
pub mod stats;
pub mod timestamp;
pub mod tracker;

// Re-export main types for convenience
pub use analyze::{CallRow, ServiceRow, analyze, analyze_reader, service_rows};
pub use display::render;
pub use graph::render_dot;
pub use parse::{Function, Marker, TRACE_MARKER, TraceClass, TraceEvent, parse_line, parse_lines};
pub use stats::{CallMap, CallTiming, ServiceId, ServiceStats, ServiceStore, ServiceSummary, Snapshot};
pub use timestamp::{elapsed_ms, parse_timestamp};
pub use tracker::{DEFAULT_MAX_IDLE_WINDOWS, Tracker};
