//! Splitting of sync windows into calendar months.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

fn first_of_next_month(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if at.month() == 12 {
        (at.year() + 1, 1)
    } else {
        (at.year(), at.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

/// Splits `[start, end)` at calendar month boundaries. The first and last
/// pieces are clipped to the exact bounds; an empty or inverted window yields
/// nothing.
pub fn partition_by_month(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<TimeRange> {
    let mut ranges = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let boundary = match first_of_next_month(cursor) {
            Some(next) if next < end => next,
            _ => end,
        };
        ranges.push(TimeRange::new(cursor, boundary));
        cursor = boundary;
    }
    ranges
}
