//! Fixed-window reporting over a live trace stream.
//!
//! [`ReportingCycle::run`] is the whole follow pipeline: pull a line, parse
//! it, feed the tracker, and every `window` hand the accumulated statistics
//! to an [`Emitter`]. Windows are aligned to the first deadline, not to the
//! moment the previous report finished, so a slow emitter doesn't make the
//! reports drift.

use std::time::{Duration, Instant};

use crate::emit::Emitter;
use crate::follow::{FollowEvent, LineSource};
use crate::trace::{ServiceStore, Tracker, parse_line};
use crate::utils::get_now;

pub struct ReportingCycle {
    window: Duration,
    deadline: Instant,
}

impl ReportingCycle {
    /// First window ends `window` from now.
    pub fn new(window: Duration) -> Self {
        Self::starting_at(Instant::now(), window)
    }

    pub fn starting_at(start: Instant, window: Duration) -> Self {
        Self {
            window,
            deadline: next_deadline(start, window),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Run until `source` closes. Returns the number of snapshots emitted.
    ///
    /// Invocations still open when the source closes are dropped; only
    /// completed statistics make it into the final report.
    pub fn run(
        &mut self,
        source: &mut impl LineSource,
        tracker: &mut Tracker,
        store: &mut ServiceStore,
        emitter: &mut impl Emitter,
    ) -> u64 {
        let mut emitted = 0;
        loop {
            match source.next_line_until(self.deadline) {
                FollowEvent::Line(line) => {
                    if let Some(event) = parse_line(&line) {
                        tracker.observe(&event, store);
                    }
                    // A busy log never yields `Pending`
                    if Instant::now() >= self.deadline {
                        self.close_window(tracker, store, emitter);
                        emitted += 1;
                    }
                }
                FollowEvent::Pending => {
                    self.close_window(tracker, store, emitter);
                    emitted += 1;
                }
                FollowEvent::Closed => {
                    if !store.is_empty() {
                        deliver(emitter, store);
                        emitted += 1;
                    }
                    log::info!(
                        "Trace source closed; dropping {} open invocations",
                        tracker.open_invocations()
                    );
                    return emitted;
                }
            }
        }
    }

    fn close_window(
        &mut self,
        tracker: &mut Tracker,
        store: &mut ServiceStore,
        emitter: &mut impl Emitter,
    ) {
        tracker.fold_open(store);
        deliver(emitter, store);
        self.deadline = next_deadline(self.deadline, self.window);
    }
}

fn deliver(emitter: &mut impl Emitter, store: &mut ServiceStore) {
    let snapshot = store.snapshot_and_reset();
    log::info!(
        "Window closed: {} services, {} invocations",
        snapshot.services.len(),
        snapshot.invocation_count()
    );
    if let Err(e) = emitter.emit(&snapshot, get_now()) {
        log::warn!("Failed to emit window: {e:#}");
    }
}

/// The deadline after `previous`.
pub fn next_deadline(previous: Instant, window: Duration) -> Instant {
    previous + window
}
