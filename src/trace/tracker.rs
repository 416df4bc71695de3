//! Correlate enter/leave trace events into completed invocations.
//!
//! Trace records from many server and client processes are interleaved in
//! the same ULOG. Each process runs at most one service at a time, so open
//! state is keyed by the process key (`simpserv.4321`) and nothing else.
//!
//! Only one outbound call per invocation is tracked at a time. Starting a
//! second `tpcall`/`tpacall` before the first one returns replaces the first,
//! and its timing is lost.
//!
//! At each window boundary [`Tracker::fold_open`] also forgets state that can
//! no longer finish: client (`proc:`) contexts with no call in flight, and any
//! context that has seen no event for [`DEFAULT_MAX_IDLE_WINDOWS`] windows
//! (configurable), such as a service whose Leave record was lost.

use std::collections::HashMap;
use std::mem;

use super::parse::{Function, Marker, TraceEvent};
use super::stats::{CallMap, CallTiming, ServiceId, ServiceStats, ServiceStore};
use super::timestamp::elapsed_ms;

/// `tpreturn(TPSUCCESS, ...)`; TPSUCCESS is 2.
const SUCCESS_RETURN_PREFIX: &str = "(2, ";

/// Windows without events after which an open invocation is dropped.
pub const DEFAULT_MAX_IDLE_WINDOWS: u32 = 10;

#[derive(Debug, Clone, Copy)]
enum CallKind {
    Sync,
    Async,
}

#[derive(Debug)]
struct PendingCall {
    target: ServiceId,
    started_ms: u32,
}

/// State for one invocation that has started but not finished.
#[derive(Debug)]
struct InvocationContext {
    service: ServiceId,
    started_ms: u32,
    failed: bool,
    pending: Option<PendingCall>,
    calls: CallMap,
    acalls: CallMap,
    /// Window boundaries passed since the last event for this process.
    idle_windows: u32,
}

impl InvocationContext {
    fn new(service: ServiceId, started_ms: u32) -> Self {
        Self {
            service,
            started_ms,
            failed: false,
            pending: None,
            calls: CallMap::new(),
            acalls: CallMap::new(),
            idle_windows: 0,
        }
    }

    /// A process-level context exists only to hold client calls.
    fn is_idle_client(&self) -> bool {
        matches!(self.service, ServiceId::Process(_)) && self.pending.is_none()
    }

    /// Move the finished calls out, leaving the invocation itself open.
    fn take_partial(&mut self) -> Option<ServiceStats> {
        if self.calls.is_empty() && self.acalls.is_empty() {
            return None;
        }
        Some(ServiceStats {
            invocations: CallTiming::default(),
            calls: mem::take(&mut self.calls),
            acalls: mem::take(&mut self.acalls),
        })
    }
}

/// Per-process invocation state machine.
#[derive(Debug)]
pub struct Tracker {
    contexts: HashMap<String, InvocationContext>,
    max_idle_windows: u32,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::with_max_idle_windows(DEFAULT_MAX_IDLE_WINDOWS)
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop open invocations after `windows` whole windows without an event.
    pub fn with_max_idle_windows(windows: u32) -> Self {
        Self {
            contexts: HashMap::new(),
            max_idle_windows: windows,
        }
    }

    /// Number of invocations currently open.
    pub fn open_invocations(&self) -> usize {
        self.contexts.len()
    }

    /// Advance the state machine for `event.process`.
    ///
    /// Completed invocations are merged into `store`. Events that don't fit
    /// the current state (a leave with nothing open, a call without a service
    /// name) are dropped.
    pub fn observe(&mut self, event: &TraceEvent, store: &mut ServiceStore) {
        match (event.marker, &event.function) {
            (Marker::Enter, Function::TpService) => self.start_service(event, store),
            (Marker::Enter, Function::TpCall | Function::TpACall) => self.start_call(event),
            (Marker::Enter, Function::TpReturn) => self.record_return(event),
            (Marker::Leave, Function::TpCall) => self.finish_call(event, CallKind::Sync),
            (Marker::Leave, Function::TpACall) => self.finish_call(event, CallKind::Async),
            (Marker::Leave, Function::TpService) => self.finish_service(event, store),
            _ => {}
        }
    }

    /// Fold finished calls of still-open invocations into `store`.
    ///
    /// The invocations stay open and are counted when they finish; only
    /// their nested call timings move, so nothing is counted twice.
    /// Client contexts with no call in flight are removed, as are contexts
    /// idle for more than the configured number of windows.
    pub fn fold_open(&mut self, store: &mut ServiceStore) {
        let max_idle = self.max_idle_windows;
        self.contexts.retain(|process, ctx| {
            if let Some(partial) = ctx.take_partial() {
                store.merge(ctx.service.clone(), partial);
            }
            if ctx.is_idle_client() {
                return false;
            }
            if ctx.idle_windows >= max_idle {
                log::debug!(
                    "Dropping {} on {process}: no events for {max_idle} windows",
                    ctx.service
                );
                return false;
            }
            ctx.idle_windows += 1;
            true
        });
    }

    fn start_service(&mut self, event: &TraceEvent, store: &mut ServiceStore) {
        let Some(name) = event.quoted_argument() else {
            log::debug!("tpservice without service name on {}", event.process);
            return;
        };

        let ctx = InvocationContext::new(ServiceId::Service(name.to_string()), event.timestamp_ms);
        if let Some(mut stale) = self.contexts.insert(event.process.clone(), ctx) {
            log::debug!(
                "{} started {} while {} was still open",
                event.process,
                name,
                stale.service
            );
            if let Some(partial) = stale.take_partial() {
                store.merge(stale.service, partial);
            }
        }
    }

    fn start_call(&mut self, event: &TraceEvent) {
        let Some(name) = event.quoted_argument() else {
            log::debug!(
                "{} without service name on {}",
                event.function.name(),
                event.process
            );
            return;
        };

        let ctx = self
            .contexts
            .entry(event.process.clone())
            .or_insert_with(|| {
                InvocationContext::new(
                    ServiceId::Process(event.process_name().to_string()),
                    event.timestamp_ms,
                )
            });
        ctx.idle_windows = 0;

        let call = PendingCall {
            target: ServiceId::Service(name.to_string()),
            started_ms: event.timestamp_ms,
        };
        if let Some(dropped) = ctx.pending.replace(call) {
            log::debug!(
                "{} called {} before {} returned; dropping its timing",
                event.process,
                name,
                dropped.target
            );
        }
    }

    fn record_return(&mut self, event: &TraceEvent) {
        let Some(ctx) = self.contexts.get_mut(&event.process) else {
            return;
        };
        ctx.idle_windows = 0;
        if !event.params.starts_with(SUCCESS_RETURN_PREFIX) {
            ctx.failed = true;
        }
    }

    fn finish_call(&mut self, event: &TraceEvent, kind: CallKind) {
        let Some(ctx) = self.contexts.get_mut(&event.process) else {
            return;
        };
        ctx.idle_windows = 0;
        let Some(call) = ctx.pending.take() else {
            return;
        };

        let timing = CallTiming::single(elapsed_ms(call.started_ms, event.timestamp_ms), false);
        let calls = match kind {
            CallKind::Sync => &mut ctx.calls,
            CallKind::Async => &mut ctx.acalls,
        };
        *calls.entry(call.target).or_default() += timing;
    }

    fn finish_service(&mut self, event: &TraceEvent, store: &mut ServiceStore) {
        let Some(ctx) = self.contexts.remove(&event.process) else {
            return;
        };

        let elapsed = elapsed_ms(ctx.started_ms, event.timestamp_ms);
        store.merge(
            ctx.service,
            ServiceStats {
                invocations: CallTiming::single(elapsed, ctx.failed),
                calls: ctx.calls,
                acalls: ctx.acalls,
            },
        );
    }
}
