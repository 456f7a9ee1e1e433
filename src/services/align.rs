//! Temporal alignment of the two feed time grids.
//!
//! The weather and seeing feeds sample on different, possibly offset
//! schedules (hourly vs. model-init + 3-hour offsets). Joining them is a
//! nearest-neighbor match on the time axis: linear scan, minimum absolute
//! delta, first-seen wins on ties. Series are bounded to ~192 entries per
//! refresh, so no index structure is warranted; switch to a binary search
//! over sorted timestamps before growing past that.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};

use crate::models::{RawAstroRecord, RawHourRecord};

/// Find the record temporally nearest to `target`. Returns `None` on an
/// empty series. Ties resolve to the earlier (first-seen) entry.
pub fn nearest_record<'a>(
    series: &'a [RawAstroRecord],
    target: DateTime<Utc>,
) -> Option<&'a RawAstroRecord> {
    // min_by_key keeps the first element on ties, which preserves the
    // stable first-seen rule as long as input order is untouched.
    series
        .iter()
        .min_by_key(|rec| (rec.time - target).num_seconds().unsigned_abs())
}

/// Bucket hourly weather records by **local** calendar date, preserving
/// insertion order of first appearance.
///
/// Local means the observer's UTC offset, not UTC: a 23:30 UTC+1 hour and
/// the following 00:30 UTC+1 hour land in different local days even though
/// both fall on the same UTC date.
pub fn group_by_local_day<'a>(
    records: &'a [RawHourRecord],
    offset: FixedOffset,
) -> Vec<(NaiveDate, Vec<&'a RawHourRecord>)> {
    let mut days: Vec<(NaiveDate, Vec<&RawHourRecord>)> = Vec::new();
    for rec in records {
        let date = local_date(rec.time, offset);
        match days.iter_mut().find(|(d, _)| *d == date) {
            Some((_, bucket)) => bucket.push(rec),
            None => days.push((date, vec![rec])),
        }
    }
    days
}

/// The local calendar date covering `time` at the given offset.
pub fn local_date(time: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    time.with_timezone(&offset).date_naive()
}

/// The local hour-of-day (0–23) covering `time` at the given offset.
pub fn local_hour(time: DateTime<Utc>, offset: FixedOffset) -> u32 {
    time.with_timezone(&offset).hour()
}

/// Night-relevant hours for observation scoring: local hour ≥18 or ≤6.
/// Inclusive at both ends by convention.
pub fn is_night_hour(hour: u32) -> bool {
    hour >= 18 || hour <= 6
}
