use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use ulog_trace::emit::Emitter;
use ulog_trace::follow::{
    Calendar, FollowConfig, FollowEvent, LineSource, LogFollower, StartPosition, ulog_path,
};
use ulog_trace::report::ReportingCycle;
use ulog_trace::trace::{ServiceStore, Snapshot, Tracker};

use super::sample_ulog;

struct FixedDay(NaiveDate);

impl Calendar for FixedDay {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Closes after the wrapped source has been idle `idle_windows` times.
struct StopWhenIdle<S> {
    inner: S,
    idle_windows: u32,
}

impl<S: LineSource> LineSource for StopWhenIdle<S> {
    fn next_line_until(&mut self, deadline: Instant) -> FollowEvent {
        match self.inner.next_line_until(deadline) {
            FollowEvent::Pending if self.idle_windows == 0 => FollowEvent::Closed,
            FollowEvent::Pending => {
                self.idle_windows -= 1;
                FollowEvent::Pending
            }
            event => event,
        }
    }
}

#[derive(Default)]
struct Totals {
    windows: usize,
    /// service -> (count, errors)
    services: BTreeMap<String, (u64, u64)>,
    /// "caller -> target" -> count
    calls: BTreeMap<String, u64>,
}

impl Emitter for Totals {
    fn emit(&mut self, snapshot: &Snapshot, _timestamp: u64) -> anyhow::Result<()> {
        self.windows += 1;
        for summary in &snapshot.services {
            let entry = self.services.entry(summary.service.to_string()).or_default();
            entry.0 += summary.count;
            entry.1 += summary.errors;
            for (target, timing) in &summary.calls {
                *self
                    .calls
                    .entry(format!("{} -> {target}", summary.service))
                    .or_default() += timing.count;
            }
        }
        Ok(())
    }
}

#[test]
fn test_follow_sample_log_through_reporting_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("ULOG");
    let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    std::fs::copy(sample_ulog(), ulog_path(&prefix, day)).unwrap();

    let follower = LogFollower::with_calendar(
        FollowConfig {
            prefix,
            poll_interval: Duration::from_millis(5),
            start_at: StartPosition::Beginning,
            max_open_retries: Some(3),
        },
        FixedDay(day),
    );
    let mut source = StopWhenIdle {
        inner: follower,
        idle_windows: 2,
    };

    let mut totals = Totals::default();
    ReportingCycle::new(Duration::from_millis(50)).run(
        &mut source,
        &mut Tracker::new(),
        &mut ServiceStore::new(),
        &mut totals,
    );

    // However the lines fell into windows, nothing is lost or counted twice
    assert!(totals.windows >= 2);
    assert_eq!(totals.services["svc:ORDER"], (2, 1));
    assert_eq!(totals.services["svc:PRICE"], (2, 0));
    assert_eq!(totals.services["svc:AUDIT"], (1, 0));
    assert_eq!(totals.calls["svc:ORDER -> svc:PRICE"], 2);
    assert_eq!(totals.calls["proc:ordcl -> svc:ORDER"], 2);
}

#[test]
fn test_follow_picks_up_appended_lines() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("ULOG");
    let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    let path = ulog_path(&prefix, day);
    std::fs::write(&path, "095959.000.host!old.1: TRACE:at: { tpservice({\"OLD\"})\n").unwrap();

    let mut follower = LogFollower::with_calendar(
        FollowConfig {
            prefix,
            poll_interval: Duration::from_millis(5),
            start_at: StartPosition::End,
            max_open_retries: None,
        },
        FixedDay(day),
    );
    assert_eq!(follower.poll_line(), FollowEvent::Pending);

    let appended = "100000.000.host!srv.1: TRACE:at: } tpservice";
    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    std::io::Write::write_all(&mut file, format!("{appended}\n").as_bytes()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    assert_eq!(
        follower.next_line_until(deadline),
        FollowEvent::Line(appended.to_string())
    );
}
