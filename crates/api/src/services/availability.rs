//! Daily availability windows.
//!
//! Markers may carry an optional "HH:MM" open window, which can wrap past
//! midnight (start > end). `is_active` is derived state: recomputed at every
//! read boundary and immediately before every write, never trusted from
//! storage.

use chrono::{Local, NaiveTime};
use thiserror::Error;

use crate::models::Marker;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("time values must use the HH:MM format")]
    InvalidTimeFormat,
    #[error("provide both an opening and a closing time, or neither")]
    MismatchedWindow,
}

/// True when a marker with the given window is open at `now`.
///
/// No window (either bound absent or blank) means always open; start == end
/// is a degenerate full-day window; start > end wraps past midnight.
pub fn compute_is_active(start: Option<&str>, end: Option<&str>, now: NaiveTime) -> bool {
    let (Some(start_raw), Some(end_raw)) = (non_blank(start), non_blank(end)) else {
        return true;
    };
    // Rows that predate window normalization may hold junk; reads treat them
    // as always open, the write boundary keeps new ones out.
    let (Some(start), Some(end)) = (parse_time(start_raw), parse_time(end_raw)) else {
        return true;
    };

    if start == end {
        true
    } else if start < end {
        start <= now && now < end
    } else {
        now >= start || now < end
    }
}

/// Recomputes `is_active` from the marker's window at the current local
/// time-of-day. Called whenever a marker is loaded for a read response and
/// immediately before every save.
pub fn apply(marker: &mut Marker) {
    marker.is_active = compute_is_active(
        marker.open_time_start.as_deref(),
        marker.open_time_end.as_deref(),
        Local::now().time(),
    );
}

/// Normalizes a window pair to minute precision. Both-present and both-absent
/// are the only valid outcomes.
pub fn normalize_window(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(Option<String>, Option<String>), WindowError> {
    let start = normalize_open_time(start)?;
    let end = normalize_open_time(end)?;

    if start.is_some() != end.is_some() {
        return Err(WindowError::MismatchedWindow);
    }

    Ok((start, end))
}

/// Parses and reformats a single bound, truncating seconds to minute
/// precision. Blank input normalizes to None.
pub fn normalize_open_time(value: Option<&str>) -> Result<Option<String>, WindowError> {
    let Some(raw) = non_blank(value) else {
        return Ok(None);
    };
    let parsed = parse_time(raw).ok_or(WindowError::InvalidTimeFormat)?;
    Ok(Some(parsed.format("%H:%M").to_string()))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}
