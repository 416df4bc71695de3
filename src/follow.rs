//! Follow a live, date-suffixed ULOG.
//!
//! The middleware writes one ULOG per calendar day, named
//! `<ULOGPFX>.<MMDDYY>`. The follower tails today's file, hands out complete
//! trace lines one at a time and, once the end of the file is reached and a
//! later day's file exists, drains what's left of the old file and moves on.
//!
//! # Blocking
//!
//! [`LogFollower::poll_line`] never blocks. [`LogFollower::next_trace_line`]
//! and [`LogFollower::next_trace_line_until`] sleep for the poll interval
//! while waiting for new data; that sleep is the only place the pipeline
//! waits.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use serde::Deserialize;

use crate::trace::TRACE_MARKER;

/// Bytes read from the log per system call.
const READ_CHUNK: usize = 64 * 1024;

/// Longest line kept while waiting for its newline; longer lines are dropped.
const MAX_LINE_BYTES: usize = 256 * 1024;

/// Where to start reading the first file the follower opens.
///
/// Files reached by day rollover are always read from the beginning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartPosition {
    Beginning,
    #[default]
    End,
}

#[derive(Debug, Clone)]
pub struct FollowConfig {
    /// ULOG path without the `.MMDDYY` suffix
    pub prefix: PathBuf,
    pub poll_interval: Duration,
    pub start_at: StartPosition,
    /// Consecutive failed opens before giving up; `None` retries forever
    pub max_open_retries: Option<u32>,
}

/// Source of "today" for picking the log file.
pub trait Calendar {
    fn today(&self) -> NaiveDate;
}

/// Today in the local timezone, matching how the middleware names its files.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCalendar;

impl Calendar for LocalCalendar {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Outcome of asking for the next line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowEvent {
    /// A complete line containing a trace record marker
    Line(String),
    /// Nothing new yet
    Pending,
    /// The log can never be read; no more lines will come
    Closed,
}

/// Something that yields trace lines up to a deadline.
pub trait LineSource {
    /// Wait until a line is available, `deadline` passes (`Pending`) or the
    /// source is exhausted (`Closed`).
    fn next_line_until(&mut self, deadline: Instant) -> FollowEvent;
}

/// `<prefix>.<MMDDYY>`
pub fn ulog_path(prefix: &Path, date: NaiveDate) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(".");
    name.push(date.format("%m%d%y").to_string());
    PathBuf::from(name)
}

/// Tails the ULOG for the current day.
#[derive(Debug)]
pub struct LogFollower<C: Calendar = LocalCalendar> {
    config: FollowConfig,
    calendar: C,
    date: NaiveDate,
    path: PathBuf,
    file: Option<File>,
    offset: u64,
    /// Read buffer, reused across reads
    buf: Vec<u8>,
    /// Bytes after the last newline seen
    partial: Vec<u8>,
    /// Skipping the rest of an over-long line
    discarding: bool,
    lines: VecDeque<String>,
    failed_opens: u32,
    /// Seek to the end on the next open (first file only, with `StartPosition::End`)
    skip_existing: bool,
    closed: bool,
}

impl LogFollower<LocalCalendar> {
    pub fn new(config: FollowConfig) -> Self {
        Self::with_calendar(config, LocalCalendar)
    }
}

impl<C: Calendar> LogFollower<C> {
    pub fn with_calendar(config: FollowConfig, calendar: C) -> Self {
        let date = calendar.today();
        let path = ulog_path(&config.prefix, date);
        let skip_existing = config.start_at == StartPosition::End;
        Self {
            config,
            calendar,
            date,
            path,
            file: None,
            offset: 0,
            buf: vec![0; READ_CHUNK],
            partial: Vec::new(),
            discarding: false,
            lines: VecDeque::new(),
            failed_opens: 0,
            skip_existing,
            closed: false,
        }
    }

    /// File currently being followed (or waited for).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the next complete trace line if one is available, without waiting.
    pub fn poll_line(&mut self) -> FollowEvent {
        if let Some(line) = self.lines.pop_front() {
            return FollowEvent::Line(line);
        }
        if self.closed {
            return FollowEvent::Closed;
        }

        if self.file.is_none() && !self.open_current() {
            if let Some((date, path)) = self.later_file() {
                self.switch_to(date, path);
                return self.poll_line();
            }
            return if self.closed {
                FollowEvent::Closed
            } else {
                FollowEvent::Pending
            };
        }

        while self.lines.is_empty() {
            match self.read_chunk() {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    log::debug!("Read from {} failed: {e}", self.path.display());
                    self.file = None;
                    return FollowEvent::Pending;
                }
            }
        }
        if let Some(line) = self.lines.pop_front() {
            return FollowEvent::Line(line);
        }

        // At end of file
        if self.was_truncated() {
            log::info!("{} was truncated; reading from the start", self.path.display());
            self.file = None;
            self.offset = 0;
            self.partial.clear();
            self.discarding = false;
            return FollowEvent::Pending;
        }

        if let Some((date, path)) = self.later_file() {
            self.drain_before_switch();
            self.switch_to(date, path);
            if let Some(line) = self.lines.pop_front() {
                return FollowEvent::Line(line);
            }
        }

        FollowEvent::Pending
    }

    /// Block until a trace line is available. `None` once the log can never be read.
    pub fn next_trace_line(&mut self) -> Option<String> {
        loop {
            match self.poll_line() {
                FollowEvent::Line(line) => return Some(line),
                FollowEvent::Closed => return None,
                FollowEvent::Pending => thread::sleep(self.config.poll_interval),
            }
        }
    }

    /// Like [`Self::next_trace_line`], but gives up with `Pending` at `deadline`.
    pub fn next_trace_line_until(&mut self, deadline: Instant) -> FollowEvent {
        loop {
            match self.poll_line() {
                FollowEvent::Pending => {
                    let now = Instant::now();
                    if now >= deadline {
                        return FollowEvent::Pending;
                    }
                    thread::sleep(self.config.poll_interval.min(deadline - now));
                }
                event => return event,
            }
        }
    }

    fn open_current(&mut self) -> bool {
        match self.open_file() {
            Ok(()) => {
                self.failed_opens = 0;
                true
            }
            Err(e) => {
                // A file that shows up later is new content; read all of it
                self.skip_existing = false;
                self.failed_opens += 1;
                log::debug!("Cannot open {}: {e}", self.path.display());

                if !log_dir(&self.path).is_dir() {
                    log::warn!(
                        "Log directory {} does not exist; stopping",
                        log_dir(&self.path).display()
                    );
                    self.closed = true;
                } else if let Some(max) = self.config.max_open_retries
                    && self.failed_opens > max
                {
                    log::warn!(
                        "Gave up on {} after {} attempts",
                        self.path.display(),
                        self.failed_opens
                    );
                    self.closed = true;
                }
                false
            }
        }
    }

    fn open_file(&mut self) -> io::Result<()> {
        let mut file = File::open(&self.path)?;
        let start = if self.skip_existing {
            file.seek(SeekFrom::End(0))?
        } else {
            file.seek(SeekFrom::Start(self.offset))?
        };

        log::info!("Following {} from byte {start}", self.path.display());
        self.offset = start;
        self.file = Some(file);
        self.skip_existing = false;
        Ok(())
    }

    /// Read once from the current file, queueing any trace lines completed by it.
    fn read_chunk(&mut self) -> io::Result<usize> {
        let Some(file) = self.file.as_mut() else {
            return Ok(0);
        };

        let n = file.read(&mut self.buf)?;
        self.offset += n as u64;
        let mut data = &self.buf[..n];
        if self.discarding {
            let Some(end) = data.iter().position(|&b| b == b'\n') else {
                return Ok(n);
            };
            self.discarding = false;
            data = &data[end + 1..];
        }
        self.partial.extend_from_slice(data);

        if let Some(last_newline) = self.partial.iter().rposition(|&b| b == b'\n') {
            let rest = self.partial.split_off(last_newline + 1);
            let complete = std::mem::replace(&mut self.partial, rest);
            for raw in complete.split(|&b| b == b'\n') {
                self.queue_line(raw);
            }
        }

        if self.partial.len() > MAX_LINE_BYTES {
            log::debug!(
                "Dropping a line longer than {MAX_LINE_BYTES} bytes in {}",
                self.path.display()
            );
            self.partial.clear();
            self.discarding = true;
        }
        Ok(n)
    }

    fn queue_line(&mut self, raw: &[u8]) {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(raw);
        if line.contains(TRACE_MARKER) {
            self.lines.push_back(line.into_owned());
        }
    }

    fn was_truncated(&self) -> bool {
        fs::metadata(&self.path).is_ok_and(|m| m.len() < self.offset)
    }

    /// The first existing file for a day after the current one, up to today.
    fn later_file(&self) -> Option<(NaiveDate, PathBuf)> {
        let today = self.calendar.today();
        let mut date = self.date;
        while date < today {
            date = date.checked_add_days(Days::new(1))?;
            let path = ulog_path(&self.config.prefix, date);
            if path.is_file() {
                return Some((date, path));
            }
        }
        None
    }

    /// Pick up anything written to the old file since the last EOF, including
    /// a final line with no trailing newline.
    fn drain_before_switch(&mut self) {
        while let Ok(n) = self.read_chunk()
            && n > 0
        {}
        if !self.partial.is_empty() {
            let rest = std::mem::take(&mut self.partial);
            self.queue_line(&rest);
        }
    }

    fn switch_to(&mut self, date: NaiveDate, path: PathBuf) {
        log::info!(
            "Day rolled over: {} -> {}",
            self.path.display(),
            path.display()
        );
        self.date = date;
        self.path = path;
        self.file = None;
        self.offset = 0;
        self.partial.clear();
        self.discarding = false;
        self.failed_opens = 0;
        self.skip_existing = false;
    }
}

impl<C: Calendar> LineSource for LogFollower<C> {
    fn next_line_until(&mut self, deadline: Instant) -> FollowEvent {
        self.next_trace_line_until(deadline)
    }
}

fn log_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
