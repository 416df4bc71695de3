//! Per-service timing statistics and the store that accumulates them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::AddAssign;
use std::time::Duration;

use serde::{Serialize, Serializer};

/// Identity that statistics are aggregated under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceId {
    /// A dispatched service, shown as `svc:NAME`
    Service(String),
    /// Calls made by a process outside any dispatched service, shown as `proc:NAME`
    Process(String),
}

impl ServiceId {
    /// Name without the `svc:`/`proc:` tag.
    pub fn name(&self) -> &str {
        match self {
            Self::Service(name) | Self::Process(name) => name.as_str(),
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Self::Service(_))
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(name) => write!(f, "svc:{name}"),
            Self::Process(name) => write!(f, "proc:{name}"),
        }
    }
}

impl Serialize for ServiceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Count, accumulated time and error count for a group of invocations or calls.
///
/// Merging sums every field; `CallTiming::default()` is the identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallTiming {
    pub count: u64,
    #[serde(rename = "total_ms", serialize_with = "serialize_millis")]
    pub total: Duration,
    pub errors: u64,
}

impl CallTiming {
    /// One observation lasting `elapsed_ms`.
    pub fn single(elapsed_ms: u32, failed: bool) -> Self {
        Self {
            count: 1,
            total: Duration::from_millis(u64::from(elapsed_ms)),
            errors: u64::from(failed),
        }
    }

    pub fn merge(&mut self, other: &CallTiming) {
        self.count += other.count;
        self.total += other.total;
        self.errors += other.errors;
    }

    /// Mean duration, or zero when nothing was counted.
    pub fn average(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.total / count,
            Err(_) => Duration::from_secs_f64(self.total.as_secs_f64() / self.count as f64),
        }
    }
}

impl AddAssign for CallTiming {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}

fn serialize_millis<S: Serializer>(total: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(total.as_millis() as u64)
}

/// Downstream service -> timing of calls made to it.
pub type CallMap = BTreeMap<ServiceId, CallTiming>;

fn merge_calls(into: &mut CallMap, from: CallMap) {
    for (target, timing) in from {
        into.entry(target)
            .and_modify(|existing| existing.merge(&timing))
            .or_insert(timing);
    }
}

/// Cumulative statistics for one service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStats {
    /// Invocations of the service itself
    pub invocations: CallTiming,
    /// Synchronous calls (`tpcall`) made while serving
    pub calls: CallMap,
    /// Asynchronous calls (`tpacall`) made while serving
    pub acalls: CallMap,
}

impl ServiceStats {
    pub fn count(&self) -> u64 {
        self.invocations.count
    }

    pub fn total(&self) -> Duration {
        self.invocations.total
    }

    pub fn errors(&self) -> u64 {
        self.invocations.errors
    }

    pub fn merge(&mut self, other: ServiceStats) {
        self.invocations.merge(&other.invocations);
        merge_calls(&mut self.calls, other.calls);
        merge_calls(&mut self.acalls, other.acalls);
    }
}

/// Accumulates completed invocations, keyed by service.
#[derive(Debug, Default)]
pub struct ServiceStore {
    services: HashMap<ServiceId, ServiceStats>,
}

impl ServiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `stats` to whatever has already been recorded for `service`.
    ///
    /// Repeated merges accumulate; submitting the same invocation twice
    /// counts it twice.
    pub fn merge(&mut self, service: ServiceId, stats: ServiceStats) {
        match self.services.get_mut(&service) {
            Some(existing) => existing.merge(stats),
            None => {
                self.services.insert(service, stats);
            }
        }
    }

    pub fn get(&self, service: &ServiceId) -> Option<&ServiceStats> {
        self.services.get(service)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Hand out everything recorded so far and start over empty.
    pub fn snapshot_and_reset(&mut self) -> Snapshot {
        Snapshot::from_services(std::mem::take(&mut self.services))
    }
}

/// Statistics for one service as delivered to emitters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSummary {
    pub service: ServiceId,
    pub count: u64,
    #[serde(rename = "total_ms", serialize_with = "serialize_millis")]
    pub total: Duration,
    pub errors: u64,
    pub calls: Vec<(ServiceId, CallTiming)>,
    pub acalls: Vec<(ServiceId, CallTiming)>,
}

impl ServiceSummary {
    /// The service's own invocations as one timing.
    pub fn invocations(&self) -> CallTiming {
        CallTiming {
            count: self.count,
            total: self.total,
            errors: self.errors,
        }
    }
}

/// Contents of a [`ServiceStore`] at one point in time, ordered by service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub services: Vec<ServiceSummary>,
}

impl Snapshot {
    fn from_services(services: HashMap<ServiceId, ServiceStats>) -> Self {
        let mut services: Vec<ServiceSummary> = services
            .into_iter()
            .map(|(service, stats)| ServiceSummary {
                service,
                count: stats.invocations.count,
                total: stats.invocations.total,
                errors: stats.invocations.errors,
                calls: stats.calls.into_iter().collect(),
                acalls: stats.acalls.into_iter().collect(),
            })
            .collect();
        services.sort_by(|a, b| a.service.cmp(&b.service));
        Self { services }
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn get(&self, service: &ServiceId) -> Option<&ServiceSummary> {
        self.services.iter().find(|s| &s.service == service)
    }

    /// Total invocations across all services.
    pub fn invocation_count(&self) -> u64 {
        self.services.iter().map(|s| s.count).sum()
    }
}
