//! Wall-clock helpers.
//!
//! Engine operations take explicit `now` timestamps (Unix epoch milliseconds)
//! so that staleness and expiry rules stay deterministic under test. Only the
//! outermost layer reads the clock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds in one minute
pub const MS_PER_MINUTE: u64 = 60_000;

/// Milliseconds in one hour
pub const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// Current time in Unix epoch milliseconds.
///
/// A clock set before the epoch reads as zero rather than panicking.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
