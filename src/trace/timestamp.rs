//! ULOG time-of-day handling.
//!
//! ULOG lines start with `HHMMSS`, or `HHMMSS.mmm` when the middleware runs
//! with `ULOGMILLISEC=Y`. There is no date component: each ULOG file covers
//! one calendar day, so a decreasing timestamp means midnight passed.

/// Milliseconds in one day.
pub const DAY_MS: u32 = 86_400_000;

/// Convert a `HHMMSS[.mmm]` field into milliseconds since midnight.
///
/// Returns `None` for anything that is not a valid time of day.
pub fn parse_timestamp(field: &str) -> Option<u32> {
    let (clock, millis) = match field.split_once('.') {
        Some((clock, millis)) => (clock, Some(millis)),
        None => (field, None),
    };

    if clock.len() != 6 || !clock.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hours: u32 = clock[0..2].parse().ok()?;
    let minutes: u32 = clock[2..4].parse().ok()?;
    let seconds: u32 = clock[4..6].parse().ok()?;
    if hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }

    let millis = match millis {
        Some(m) if m.len() == 3 && m.bytes().all(|b| b.is_ascii_digit()) => m.parse().ok()?,
        Some(_) => return None,
        None => 0,
    };

    Some(((hours * 60 + minutes) * 60 + seconds) * 1000 + millis)
}

/// Milliseconds from `start` to `end`, both measured since midnight.
///
/// An `end` earlier than `start` is read as a midnight rollover.
pub fn elapsed_ms(start: u32, end: u32) -> u32 {
    if end >= start {
        end - start
    } else {
        end + DAY_MS - start
    }
}
