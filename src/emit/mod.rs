//! Deliver window snapshots to their consumers.
//!
//! Every sink implements [`Emitter`]. Metric sinks (Graphite, JSON) share the
//! flattening in [`metrics`]: one named value per service statistic and per
//! call target, e.g. `tuxedo.ORDER.total_ms` or
//! `tuxedo.ORDER.calls.PRICE.count`.

mod graphite;
mod json;
mod table;

pub use graphite::{GraphiteEmitter, format_plaintext};
pub use json::JsonEmitter;
pub use table::TableEmitter;

use serde::Serialize;

use crate::trace::{CallTiming, ServiceId, Snapshot};

/// A consumer of per-window statistics.
pub trait Emitter {
    /// Deliver `snapshot`, which covers the window ending at `timestamp`
    /// (seconds since the Unix epoch).
    fn emit(&mut self, snapshot: &Snapshot, timestamp: u64) -> anyhow::Result<()>;
}

impl<E: Emitter + ?Sized> Emitter for Box<E> {
    fn emit(&mut self, snapshot: &Snapshot, timestamp: u64) -> anyhow::Result<()> {
        (**self).emit(snapshot, timestamp)
    }
}

/// Sends each snapshot to several emitters.
///
/// Every emitter gets the snapshot even if an earlier one fails; the first
/// failure is returned.
#[derive(Default)]
pub struct Fanout {
    emitters: Vec<Box<dyn Emitter>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, emitter: Box<dyn Emitter>) {
        self.emitters.push(emitter);
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }
}

impl Emitter for Fanout {
    fn emit(&mut self, snapshot: &Snapshot, timestamp: u64) -> anyhow::Result<()> {
        let mut first_error = None;
        for emitter in &mut self.emitters {
            if let Err(e) = emitter.emit(snapshot, timestamp) {
                log::debug!("Emitter failed: {e:#}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// One named value, as pushed to a metric sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub timestamp: u64,
}

/// Flatten a snapshot into metrics under `namespace`.
pub fn metrics(snapshot: &Snapshot, namespace: &str, timestamp: u64) -> Vec<Metric> {
    let mut out = Vec::new();
    let mut push = |name: String, value: f64| {
        out.push(Metric {
            name,
            value,
            timestamp,
        })
    };

    for summary in &snapshot.services {
        let base = format!("{}.{}", sanitize(namespace), metric_segment(&summary.service));
        push(format!("{base}.count"), summary.count as f64);
        push(format!("{base}.errors"), summary.errors as f64);
        push(format!("{base}.total_ms"), summary.total.as_millis() as f64);
        let invocations = summary.invocations();
        if invocations.count > 0 {
            let avg = invocations.average().as_micros() as f64 / 1000.0;
            push(format!("{base}.avg_ms"), avg);
        }

        for (kind, calls) in [("calls", &summary.calls), ("acalls", &summary.acalls)] {
            for (target, timing) in calls {
                let prefix = format!("{base}.{kind}.{}", metric_segment(target));
                push_call(&mut push, &prefix, timing);
            }
        }
    }

    out
}

fn push_call(push: &mut impl FnMut(String, f64), prefix: &str, timing: &CallTiming) {
    push(format!("{prefix}.count"), timing.count as f64);
    push(format!("{prefix}.total_ms"), timing.total.as_millis() as f64);
}

/// Metric path segment for a service: the bare name for services,
/// `proc_<name>` for process-level callers.
fn metric_segment(service: &ServiceId) -> String {
    match service {
        ServiceId::Service(name) => sanitize(name),
        ServiceId::Process(name) => format!("proc_{}", sanitize(name)),
    }
}

/// Replace characters that carry meaning in metric paths.
fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '.' | ' ' | '\t' | '/' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::trace::{CallMap, ServiceStats, ServiceStore};

    pub(crate) fn sample_snapshot() -> Snapshot {
        let mut store = ServiceStore::new();
        let mut calls = CallMap::new();
        calls.insert(
            ServiceId::Service("PRICE".to_string()),
            CallTiming {
                count: 2,
                total: Duration::from_millis(630),
                errors: 0,
            },
        );
        store.merge(
            ServiceId::Service("ORDER".to_string()),
            ServiceStats {
                invocations: CallTiming {
                    count: 2,
                    total: Duration::from_millis(900),
                    errors: 1,
                },
                calls,
                acalls: CallMap::new(),
            },
        );
        store.merge(
            ServiceId::Process("ord.cl".to_string()),
            ServiceStats::default(),
        );
        store.snapshot_and_reset()
    }

    struct Recording(Rc<RefCell<Vec<u64>>>);

    impl Emitter for Recording {
        fn emit(&mut self, _: &Snapshot, timestamp: u64) -> anyhow::Result<()> {
            self.0.borrow_mut().push(timestamp);
            Ok(())
        }
    }

    struct Failing;

    impl Emitter for Failing {
        fn emit(&mut self, _: &Snapshot, _: u64) -> anyhow::Result<()> {
            anyhow::bail!("sink down")
        }
    }

    #[test]
    fn test_metric_names() {
        let names: Vec<String> = metrics(&sample_snapshot(), "tux.prod", 100)
            .into_iter()
            .map(|m| format!("{} {}", m.name, m.value))
            .collect();
        assert_eq!(
            names,
            [
                "tux_prod.ORDER.count 2",
                "tux_prod.ORDER.errors 1",
                "tux_prod.ORDER.total_ms 900",
                "tux_prod.ORDER.avg_ms 450",
                "tux_prod.ORDER.calls.PRICE.count 2",
                "tux_prod.ORDER.calls.PRICE.total_ms 630",
                "tux_prod.proc_ord_cl.count 0",
                "tux_prod.proc_ord_cl.errors 0",
                "tux_prod.proc_ord_cl.total_ms 0",
            ]
        );
    }

    #[test]
    fn test_fanout_continues_after_failure() {
        let mut fanout = Fanout::new();
        fanout.push(Box::new(Failing));
        let seen = Rc::new(RefCell::new(Vec::new()));
        fanout.push(Box::new(Recording(seen.clone())));
        assert_eq!(fanout.len(), 2);

        let err = fanout.emit(&Snapshot::default(), 7).unwrap_err();
        assert_eq!(err.to_string(), "sink down");
        assert_eq!(*seen.borrow(), [7]);
    }

    #[test]
    fn test_empty_fanout_is_ok() {
        let mut fanout = Fanout::new();
        assert!(fanout.is_empty());
        assert!(fanout.emit(&Snapshot::default(), 7).is_ok());
    }
}
