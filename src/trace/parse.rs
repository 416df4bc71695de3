//! Parse ULOG trace records.
//!
//! With `TMTRACE` enabled the middleware writes lines like:
//!
//! ```text
//! 121449.123.host!simpserv.4321: TRACE:at: { tpservice({"TOUPPER", 0x0, 0x0, 5, 0, -1, {0, -2, -1}})
//! 121449.125.host!simpserv.4321: TRACE:at: } tpservice
//! ```
//!
//! Everything else in the ULOG is ordinary diagnostics and is skipped.

use std::sync::LazyLock;

use regex::Regex;

use super::timestamp::parse_timestamp;

/// Literal every trace record carries; cheap pre-filter before the regex.
pub const TRACE_MARKER: &str = "TRACE:";

static TRACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{6}(?:\.\d{3})?).*!([^ ]+): .*TRACE:(at|ia): *([{}]) ([a-z]+)(.*)")
        .expect("trace record regex is valid")
});

/// Trace category from the `TRACE:<class>:` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceClass {
    /// `at`: application-visible ATMI calls
    Atmi,
    /// `ia`: ATMI calls made internally by the runtime
    InternalAtmi,
}

/// Whether the traced function is being entered (`{`) or left (`}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Enter,
    Leave,
}

/// Traced function name. Only four take part in correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Function {
    TpService,
    TpCall,
    TpACall,
    TpReturn,
    Other(String),
}

impl Function {
    fn from_name(name: &str) -> Self {
        match name {
            "tpservice" => Self::TpService,
            "tpcall" => Self::TpCall,
            "tpacall" => Self::TpACall,
            "tpreturn" => Self::TpReturn,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::TpService => "tpservice",
            Self::TpCall => "tpcall",
            Self::TpACall => "tpacall",
            Self::TpReturn => "tpreturn",
            Self::Other(name) => name.as_str(),
        }
    }
}

/// A single parsed trace record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Milliseconds since midnight
    pub timestamp_ms: u32,
    /// Process name and instance id, e.g. `simpserv.4321`
    pub process: String,
    pub class: TraceClass,
    pub marker: Marker,
    pub function: Function,
    /// Raw text following the function name
    pub params: String,
}

impl TraceEvent {
    /// Process name without the instance id (`simpserv.4321` -> `simpserv`).
    pub fn process_name(&self) -> &str {
        self.process.split('.').next().unwrap_or(&self.process)
    }

    /// First double-quoted argument in the parameter text.
    ///
    /// `tpservice`, `tpcall` and `tpacall` name their service this way.
    pub fn quoted_argument(&self) -> Option<&str> {
        quoted_argument(&self.params)
    }
}

/// Parse a single line. Returns `None` for anything that isn't a trace record.
pub fn parse_line(line: &str) -> Option<TraceEvent> {
    let line = line.trim_end();
    if !line.contains(TRACE_MARKER) {
        return None;
    }

    let caps = TRACE_RE.captures(line)?;
    let timestamp_ms = parse_timestamp(caps.get(1)?.as_str())?;

    let class = match caps.get(3)?.as_str() {
        "at" => TraceClass::Atmi,
        _ => TraceClass::InternalAtmi,
    };
    let marker = match caps.get(4)?.as_str() {
        "{" => Marker::Enter,
        _ => Marker::Leave,
    };

    Some(TraceEvent {
        timestamp_ms,
        process: caps.get(2)?.as_str().to_string(),
        class,
        marker,
        function: Function::from_name(caps.get(5)?.as_str()),
        params: caps.get(6).map_or("", |m| m.as_str()).to_string(),
    })
}

/// Parse every trace record in a block of text, skipping other lines.
pub fn parse_lines(input: &str) -> Vec<TraceEvent> {
    input.lines().filter_map(parse_line).collect()
}

fn quoted_argument(params: &str) -> Option<&str> {
    let (_, rest) = params.split_once('"')?;
    let (name, _) = rest.split_once('"')?;
    (!name.is_empty()).then_some(name)
}
