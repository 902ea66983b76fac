//! Canonical timestamp strings used for change detection.
//!
//! Captured timestamps and locally observed ones can differ in offset and in
//! how many fractional digits they were written with. Both sides are rendered
//! into one canonical form (UTC, nine fractional digits) and compared as
//! strings, case-insensitively.

use chrono::{DateTime, TimeZone, Utc};

const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

/// Render a timestamp in its canonical comparison form.
pub fn canonical<Tz: TimeZone>(time: &DateTime<Tz>) -> String {
    time.with_timezone(&Utc).format(CANONICAL_FORMAT).to_string()
}

/// True when both timestamps render to the same canonical string.
pub fn same_time<A: TimeZone, B: TimeZone>(a: &DateTime<A>, b: &DateTime<B>) -> bool {
    canonical(a).eq_ignore_ascii_case(&canonical(b))
}

/// Convert Unix seconds/nanoseconds as reported by the OS into UTC.
pub fn from_unix(secs: i64, nanos: u32) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, nanos).single()
}
