//! Correlate Tuxedo ULOG trace records into per-service timing statistics.
//!
//! The pipeline is [`follow::LogFollower`] → [`trace::parse_line`] →
//! [`trace::Tracker`] → [`trace::ServiceStore`], drained once per window by
//! [`report::ReportingCycle`] into an [`emit::Emitter`]. For one-shot analysis
//! of a finished log, [`trace::analyze_reader`] runs the same parser and
//! tracker over any reader.

pub mod config;
pub mod emit;
pub mod error;
pub mod follow;
pub mod report;
pub mod styling;
pub mod trace;
pub mod utils;

pub use error::UlogError;
